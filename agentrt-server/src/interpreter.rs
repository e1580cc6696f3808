//! Directive interpreter (C11) — the collaborators that turn the pure
//! [`Directive`] values a `cmd` call returns into actual effects: routing an
//! `Emit`, building the agent for a `Spawn`.
//!
//! One small async trait per effect family, with a no-op/local default
//! implementation, so a product can override dispatch semantics without
//! forking the scheduler loop.

use agentrt_core::{AgentId, AgentRuntimeError, DispatchConfig, Signal};
use agentrt_registry::Registry;
use agentrt_router::Router;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Builds a fresh [`agentrt_core::Agent`] for a `Spawn` directive's opaque
/// `child_spec`. User code implements this once per agent module; the
/// runtime never interprets `child_spec`'s shape itself.
#[async_trait]
pub trait AgentFactory: Send + Sync {
    /// Construct the child agent. `parent` is the spawning agent's id, in
    /// case the factory wants to fold it into the child's initial state.
    async fn build(&self, child_spec: Value, parent: &AgentId) -> Result<agentrt_core::Agent, AgentRuntimeError>;
}

/// Routes `Emit` directives to their destination.
///
/// By the time a directive reaches here, `agent_server::interpret_one` has
/// already resolved `directive.dispatch ?? server.default_dispatch` (§4.6)
/// and only calls this trait when that resolution produced `Some` — a
/// fully-nil dispatch is logged and dropped before this trait is ever
/// invoked.
///
/// Resolved open question: a signal with no registered route, or emitted
/// with no dispatcher configured at all, is logged and dropped rather than
/// erroring the emitting agent — emission is fire-and-forget by design.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Deliver `signal` using the already-resolved `dispatch` config (the
    /// directive's own override, or the server's default, per §4.6).
    async fn dispatch(&self, signal: Signal, dispatch: Option<DispatchConfig>);
}

/// The default dispatcher: logs and drops every signal. Used when a server
/// is started without an explicit [`Dispatcher`].
pub struct NoopDispatcher;

#[async_trait]
impl Dispatcher for NoopDispatcher {
    async fn dispatch(&self, signal: Signal, dispatch: Option<DispatchConfig>) {
        tracing::debug!(
            signal_id = %signal.id,
            signal_type = %signal.kind,
            dispatch = ?dispatch,
            "agent_server.dispatch.unconfigured_drop"
        );
    }
}

/// A handle abstraction the router dispatches to. Kept separate from
/// `server::AgentHandle` so this module has no dependency cycle on
/// `server.rs`; `server::AgentHandle` implements it directly.
#[async_trait]
pub trait Castable: Clone + Send + Sync + 'static {
    /// Deliver `signal` without waiting for a reply.
    async fn cast(&self, signal: Signal) -> Result<(), AgentRuntimeError>;
}

/// Routes `Emit` directives to registered agents by signal type, using the
/// same trie matching ordinary signal routing uses.
///
/// An ordered-pipeline dispatch generalized to cross-agent delivery: every
/// matching route's handle receives the signal via `cast`.
pub struct RouterDispatcher<H: Castable> {
    router: RwLock<Router<H>>,
    registry: Registry<H>,
}

impl<H: Castable> RouterDispatcher<H> {
    /// Build a dispatcher sharing an existing registry (so routes can
    /// resolve to any agent known to the runtime).
    pub fn new(registry: Registry<H>) -> Self {
        Self {
            router: RwLock::new(Router::new()),
            registry,
        }
    }

    /// Register `handler` to receive every `Emit`'d signal matching
    /// `pattern`, per the shared trie/priority rules.
    pub fn register_route(
        &self,
        pattern: &str,
        handler: H,
        priority: i32,
    ) -> Result<(), agentrt_core::RoutingError> {
        self.router
            .write()
            .expect("router lock poisoned")
            .register(pattern, handler, priority)
    }

    /// The registry this dispatcher resolves handles against, e.g. to look
    /// up an explicit `subject` target directly rather than by pattern.
    pub fn registry(&self) -> &Registry<H> {
        &self.registry
    }
}

#[async_trait]
impl<H: Castable> Dispatcher for RouterDispatcher<H> {
    async fn dispatch(&self, signal: Signal, dispatch: Option<DispatchConfig>) {
        tracing::trace!(
            signal_id = %signal.id,
            signal_type = %signal.kind,
            dispatch = ?dispatch,
            "agent_server.dispatch.routing_by_signal_type"
        );
        let hits = {
            let router = self.router.read().expect("router lock poisoned");
            router.route_with_diagnostics(&signal.kind)
        };
        match hits {
            Ok((handlers, diagnostics)) => {
                for failure in diagnostics {
                    tracing::warn!(
                        signal_id = %signal.id,
                        signal_type = %signal.kind,
                        error = %failure,
                        "agent_server.dispatch.predicate_failed"
                    );
                }
                for handler in handlers {
                    if let Err(e) = handler.cast(signal.clone()).await {
                        tracing::debug!(error = %e, "agent_server.dispatch.cast_failed");
                    }
                }
            }
            Err(_) => {
                tracing::debug!(
                    signal_id = %signal.id,
                    signal_type = %signal.kind,
                    "agent_server.dispatch.unconfigured_drop"
                );
            }
        }
    }
}
