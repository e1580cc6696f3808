//! Error taxonomy (§7): kinds, not type names.
//!
//! Each kind is its own `thiserror`-derived, `#[non_exhaustive]` enum with a
//! catch-all `Other` variant, mirroring the layered error design this crate
//! is built from. [`AgentRuntimeError`] unifies the taxonomy for call sites
//! that can fail at more than one layer.

use thiserror::Error;

/// Bad parameters, bad signal envelope, schema violation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A signal's `type` field was empty.
    #[error("signal type must not be empty")]
    EmptySignalType,

    /// A signal's `type` field contained characters outside `[A-Za-z0-9_.]`.
    #[error("signal type {0:?} contains invalid characters")]
    InvalidSignalType(String),

    /// A wire envelope carried an extension field this runtime doesn't
    /// recognize (non-`jido_*` legacy naming — see DESIGN.md open question 3).
    #[error("unknown extension field: {0}")]
    UnknownExtensionField(String),

    /// `params` (or another field required to be a mapping) was not one.
    #[error("{field} must be a mapping, got {got}")]
    NotAMapping {
        /// Name of the offending field.
        field: String,
        /// A short description of what was found instead.
        got: String,
    },

    /// A nested list of instructions was rejected (nesting is not allowed).
    #[error("nested instruction lists are not allowed")]
    NestedInstructionList,

    /// An agent's `state` failed schema validation.
    #[error("schema violation: {0}")]
    SchemaViolation(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// No handler, invalid path, invalid priority, pattern predicate failure.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RoutingError {
    /// No route matched the signal type.
    #[error("no handler for signal type {0:?}")]
    NoHandler(String),

    /// A pattern was malformed at registration time.
    #[error("invalid route pattern {0:?}: {1}")]
    InvalidPattern(String, String),

    /// A priority value fell outside `[-100, 100]`.
    #[error("priority {0} out of range [-100, 100]")]
    InvalidPriority(i32),

    /// A pattern predicate raised instead of returning a boolean.
    #[error("predicate for pattern {0:?} failed: {1}")]
    PredicateFailed(String, String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// An action raised or returned `Err`.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The named action is not registered.
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The action returned an error for the given reason.
    #[error("action {action} failed: {reason}")]
    ActionFailed {
        /// The action key.
        action: String,
        /// The reason reported by the action.
        reason: String,
    },

    /// Param validation against the action's declared schema failed.
    #[error("invalid params for {action}: {reason}")]
    InvalidParams {
        /// The action key.
        action: String,
        /// Description of the validation failure.
        reason: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Compile-time/setup-time misconfiguration.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An agent/module name did not match `^[A-Za-z][A-Za-z0-9_]*$`.
    #[error("invalid name {0:?}: must match ^[A-Za-z][A-Za-z0-9_]*$")]
    InvalidName(String),

    /// Two skills (or a skill and the agent schema) declared the same
    /// `state_key`.
    #[error("duplicate state key: {0:?}")]
    DuplicateStateKey(String),

    /// `id` was already registered in the Registry.
    #[error("id already registered: {0}")]
    DuplicateId(String),

    /// `max_queue_size` (or another tunable) was set to an invalid value.
    #[error("invalid tunable {name}: {reason}")]
    InvalidTunable {
        /// Name of the tunable.
        name: String,
        /// Why it's invalid.
        reason: String,
    },

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Caller-side only, for synchronous calls.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum TimeoutError {
    /// A synchronous `call` exceeded its timeout.
    #[error("call to {target} timed out after {timeout_ms}ms")]
    CallTimedOut {
        /// The target agent id or description.
        target: String,
        /// The configured timeout.
        timeout_ms: u64,
    },
}

/// Invariant violations; always fatal to the current operation.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum InternalError {
    /// A `handle_signal`/`cmd` invocation panicked.
    #[error("agent handler panicked: {0}")]
    HandlerPanicked(String),

    /// An invariant the runtime relies on was violated.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Wraps an original error plus the outcome of its compensation attempt.
#[derive(Debug, Error)]
#[error("compensation {status} for original error: {original}")]
pub struct CompensationError {
    /// The error that triggered compensation.
    pub original: String,
    /// Whether compensation itself succeeded.
    pub status: CompensationStatus,
    /// Optional extra details about the compensation attempt.
    pub details: Option<String>,
}

/// Outcome of a compensation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompensationStatus {
    /// The compensating action completed successfully.
    Succeeded,
    /// The compensating action itself failed.
    Failed,
}

impl std::fmt::Display for CompensationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompensationStatus::Succeeded => write!(f, "succeeded"),
            CompensationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Storage-layer errors (checkpoint/thread put/get/append).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StorageError {
    /// The requested checkpoint or thread does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// `append_thread` was called with a stale `expected_rev`.
    #[error("revision conflict: expected {expected}, found {actual}")]
    RevisionConflict {
        /// The revision the caller expected.
        expected: u64,
        /// The revision actually found in storage.
        actual: u64,
    },

    /// The persisted thread was missing or behind the checkpoint's pointer.
    #[error("thread mismatch for checkpoint pointer {0:?}")]
    ThreadMismatch(String),

    /// The underlying I/O or serialization layer failed.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

/// Unifies the taxonomy for call sites that can fail at more than one layer
/// (e.g. `AgentServer::call`, which can surface validation, routing,
/// execution, or timeout failures).
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum AgentRuntimeError {
    /// See [`ValidationError`].
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// See [`RoutingError`].
    #[error(transparent)]
    Routing(#[from] RoutingError),

    /// See [`ExecutionError`].
    #[error(transparent)]
    Execution(#[from] ExecutionError),

    /// See [`ConfigError`].
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// See [`TimeoutError`].
    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    /// See [`InternalError`].
    #[error(transparent)]
    Internal(#[from] InternalError),

    /// See [`StorageError`].
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Catch-all.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
