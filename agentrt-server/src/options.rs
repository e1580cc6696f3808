//! Server configuration (§6) — plain, validated structs built with `..`
//! defaults, not a config-file loader: constructor-validated option structs
//! in place of external configuration.

use agentrt_core::{ConfigError, DispatchConfig};

/// Process-wide tunables shared by every agent server spawned in this
/// runtime. Defaults match the reference runtime's published values.
#[derive(Debug, Clone)]
pub struct RuntimeTunables {
    /// Default timeout for `AgentHandle::call`, in milliseconds.
    pub agent_server_call_timeout_ms: u64,
    /// Default timeout for awaiting a child/child-group, in milliseconds.
    pub await_timeout_ms: u64,
    /// Timeout applied to a single plugin hook invocation, in milliseconds.
    pub plugin_hook_timeout_ms: u64,
    /// Soft cap on live agents tracked by a `Registry`.
    pub max_agents: usize,
    /// Default bound on a per-agent's `(signal, directive)` drain queue.
    pub max_queue_size: usize,
    /// Soft cap on concurrently-scheduled delayed deliveries.
    pub max_tasks: usize,
    /// Supervisor restart budget: max restarts...
    pub agent_supervisor_max_restarts: u32,
    /// ...within this many seconds.
    pub agent_supervisor_max_seconds: u64,
}

impl Default for RuntimeTunables {
    fn default() -> Self {
        Self {
            agent_server_call_timeout_ms: 10_000,
            await_timeout_ms: 10_000,
            plugin_hook_timeout_ms: 1_000,
            max_agents: 10_000,
            max_queue_size: 10_000,
            max_tasks: 1_000,
            agent_supervisor_max_restarts: 1_000,
            agent_supervisor_max_seconds: 5,
        }
    }
}

impl RuntimeTunables {
    /// Reject tunables that would make the runtime unusable (zero timeouts,
    /// zero capacities).
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks: [(&str, u64); 3] = [
            ("agent_server_call_timeout_ms", self.agent_server_call_timeout_ms),
            ("await_timeout_ms", self.await_timeout_ms),
            ("plugin_hook_timeout_ms", self.plugin_hook_timeout_ms),
        ];
        for (name, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidTunable {
                    name: name.to_string(),
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::InvalidTunable {
                name: "max_queue_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.max_agents == 0 {
            return Err(ConfigError::InvalidTunable {
                name: "max_agents".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// What a child does when it learns its parent has died without an explicit
/// `Stop` directed at it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnParentDeath {
    /// Stop immediately with reason `"orphaned"`.
    StopSelf,
    /// Keep running; the agent sees a synthetic `jido.orphaned` signal and
    /// decides for itself.
    Orphan,
    /// Keep running; log the parent's exit and otherwise do nothing — no
    /// synthetic signal, no stop.
    Continue,
}

/// How the directive interpreter reacts to an `Error` directive (§4.6/§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorPolicy {
    /// Log the structured error and keep draining (the default).
    LogOnly,
    /// Log the structured error, then stop the agent with reason `error`.
    StopOnError,
}

/// Per-agent-server startup options (§6 server lifecycle options).
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Mailbox capacity before `call`/`cast` see backpressure.
    pub max_queue_size: usize,
    /// Default timeout for `call`, in milliseconds, when the caller doesn't
    /// override it.
    pub call_timeout_ms: u64,
    /// What this agent does if its parent dies without stopping it.
    pub on_parent_death: OnParentDeath,
    /// How `Error` directives are handled by the interpreter.
    pub error_policy: ErrorPolicy,
    /// Dispatch config used for an `Emit` directive that doesn't carry its
    /// own `dispatch` override (§4.6: `directive.dispatch ?? server.
    /// default_dispatch`).
    pub default_dispatch: Option<DispatchConfig>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self::from_tunables(&RuntimeTunables::default())
    }
}

impl ServerOptions {
    /// Derive server options from process-wide tunables.
    pub fn from_tunables(tunables: &RuntimeTunables) -> Self {
        Self {
            max_queue_size: tunables.max_queue_size,
            call_timeout_ms: tunables.agent_server_call_timeout_ms,
            on_parent_death: OnParentDeath::StopSelf,
            error_policy: ErrorPolicy::LogOnly,
            default_dispatch: None,
        }
    }

    /// Override the mailbox capacity.
    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    /// Override the default call timeout.
    pub fn with_call_timeout_ms(mut self, call_timeout_ms: u64) -> Self {
        self.call_timeout_ms = call_timeout_ms;
        self
    }

    /// Override the parent-death policy.
    pub fn with_on_parent_death(mut self, policy: OnParentDeath) -> Self {
        self.on_parent_death = policy;
        self
    }

    /// Override the `Error`-directive policy.
    pub fn with_error_policy(mut self, policy: ErrorPolicy) -> Self {
        self.error_policy = policy;
        self
    }

    /// Set the server-wide default dispatch, used by `Emit` directives that
    /// don't carry their own override.
    pub fn with_default_dispatch(mut self, dispatch: DispatchConfig) -> Self {
        self.default_dispatch = Some(dispatch);
        self
    }

    /// Reject a zero-capacity mailbox or zero-length timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::InvalidTunable {
                name: "max_queue_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.call_timeout_ms == 0 {
            return Err(ConfigError::InvalidTunable {
                name: "call_timeout_ms".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
