//! Storage interface (C6) — backend-independent checkpoint and thread
//! persistence, with optimistic-concurrency thread appends.
//!
//! An async trait returning `Result<_, StorageError>`, keyed around
//! `(agent_module, id)` checkpoints and `id`-keyed threads rather than
//! arbitrary scoped key-value pairs.

use crate::error::StorageError;
use crate::id::{AgentId, ThreadId};
use crate::thread::{NewEntry, Thread};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifies a checkpoint: the agent module/type name plus instance id.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct CheckpointKey {
    /// The agent module/type identifier (user-defined namespace).
    pub agent_module: String,
    /// The agent instance id.
    pub id: AgentId,
}

impl CheckpointKey {
    /// Build a new checkpoint key.
    pub fn new(agent_module: impl Into<String>, id: AgentId) -> Self {
        Self {
            agent_module: agent_module.into(),
            id,
        }
    }
}

/// A pointer to a thread, carried inside a [`Checkpoint`]. Never embeds the
/// thread body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ThreadPointer {
    /// The thread's id.
    pub id: ThreadId,
    /// The revision known at hibernate time.
    pub rev: u64,
}

/// A persisted snapshot of an agent's state (without its thread body) plus
/// an optional thread pointer.
///
/// Invariant: `state` never contains `__thread__`; `thread` is either
/// absent or `{id, rev}` only — never the full thread struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Checkpoint format version.
    pub version: u32,
    /// The agent module/type identifier.
    pub agent_module: String,
    /// The agent instance id.
    pub id: AgentId,
    /// The agent's state, without `__thread__`.
    pub state: Map<String, Value>,
    /// Pointer to the journal thread, if threading was enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadPointer>,
}

/// Current checkpoint format version.
pub const CHECKPOINT_VERSION: u32 = 1;

/// Backend-independent persistence for checkpoints and threads.
///
/// Implementations must be safe for concurrent callers across agents;
/// `append_thread` must honor `expected_rev` as an optimistic-concurrency
/// compare-and-swap.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist (overwrite) the checkpoint at `key`.
    async fn put_checkpoint(
        &self,
        key: &CheckpointKey,
        checkpoint: Checkpoint,
    ) -> Result<(), StorageError>;

    /// Load the checkpoint at `key`.
    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Checkpoint, StorageError>;

    /// Remove the checkpoint at `key`, if present.
    async fn delete_checkpoint(&self, key: &CheckpointKey) -> Result<(), StorageError>;

    /// Append `entries` to the thread `id`, creating it if absent.
    ///
    /// If `expected_rev` is `Some`, the append is rejected with
    /// `StorageError::RevisionConflict` when it doesn't match the thread's
    /// current revision.
    async fn append_thread(
        &self,
        id: &ThreadId,
        entries: Vec<NewEntry>,
        expected_rev: Option<u64>,
        now: u64,
    ) -> Result<Thread, StorageError>;

    /// Load the thread `id`.
    async fn load_thread(&self, id: &ThreadId) -> Result<Thread, StorageError>;
}
