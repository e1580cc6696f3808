//! Strategy (C8) — the pluggable execution policy an [`crate::agent::Agent`]
//! delegates to. `Direct` and `Fsm` are the two shipped implementations
//! (in the `agentrt-strategy-direct`/`agentrt-strategy-fsm` crates); third
//! parties implement this trait directly (see `demos/custom_strategy_example`).
//!
//! One executor shape per execution-policy kind (direct, FSM-gated, ...)
//! behind one object-safe trait, so `Agent` can hold an `Arc<dyn Strategy>`
//! without a generic parameter.

use crate::action::ActionRegistry;
use crate::agent::Agent;
use crate::directive::Directive;
use crate::error::AgentRuntimeError;
use crate::instruction::Instruction;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Collaborators a strategy needs beyond the agent's own state: the action
/// lookup and the current wall-clock reading (threaded through rather than
/// read from the system clock, so strategies stay pure and testable).
#[derive(Clone)]
pub struct StrategyContext {
    /// Resolves an instruction's `action` key to a handler.
    pub actions: Arc<ActionRegistry>,
    /// Milliseconds since epoch, supplied by the caller.
    pub now: u64,
}

impl StrategyContext {
    /// Build a context from an action registry and the current time.
    pub fn new(actions: Arc<ActionRegistry>, now: u64) -> Self {
        Self { actions, now }
    }
}

/// A routing hint a strategy can advertise so a server can pre-register
/// signal→action routes without the strategy depending on the router crate.
#[derive(Debug, Clone)]
pub struct RouteHint {
    /// Dotted pattern, possibly containing `*`/`**` wildcards.
    pub pattern: String,
    /// Priority in `[-100, 100]`; higher runs first.
    pub priority: i32,
}

/// The execution policy invoked by [`crate::agent::Agent::cmd`].
///
/// Implementations must be pure with respect to `agent`: they receive it by
/// reference and return a new, independent [`Agent`] — never mutate through
/// interior mutability to simulate a stateful update.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Run once at agent startup, before any signal is processed. Typically
    /// seeds `state.__strategy__` or similar bookkeeping.
    async fn init(
        &self,
        agent: &Agent,
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError>;

    /// Execute `instructions` against `agent`, returning the next agent
    /// value and any directives accumulated along the way.
    async fn cmd(
        &self,
        agent: &Agent,
        instructions: Vec<Instruction>,
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError>;

    /// Project `agent` into the externally-visible view a caller's `call`
    /// receives. Default: the agent's state verbatim.
    fn snapshot(&self, agent: &Agent) -> Value {
        Value::Object(agent.state.clone())
    }

    /// Routes this strategy wants pre-registered with a router at startup.
    /// Default: none — routing is the caller's responsibility.
    fn signal_routes(&self) -> Vec<RouteHint> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;
    use crate::id::AgentId;
    use crate::schema::Schema;
    use serde_json::Map;

    struct NoOp;

    #[async_trait]
    impl Strategy for NoOp {
        async fn init(
            &self,
            agent: &Agent,
            _ctx: &StrategyContext,
        ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
            Ok((agent.clone(), Vec::new()))
        }

        async fn cmd(
            &self,
            agent: &Agent,
            instructions: Vec<Instruction>,
            _ctx: &StrategyContext,
        ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
            if instructions.is_empty() {
                return Ok((agent.clone(), Vec::new()));
            }
            Err(AgentRuntimeError::Execution(ExecutionError::UnknownAction(
                instructions[0].action.clone(),
            )))
        }
    }

    fn test_agent() -> Agent {
        Agent::new(
            AgentId::new("a1"),
            "test_agent",
            Arc::new(Schema::none()),
            Arc::new(NoOp),
            Map::new(),
            false,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn default_snapshot_mirrors_state() {
        let agent = test_agent();
        let strategy = NoOp;
        assert_eq!(strategy.snapshot(&agent), Value::Object(agent.state.clone()));
    }

    #[test]
    fn default_signal_routes_are_empty() {
        assert!(NoOp.signal_routes().is_empty());
    }
}
