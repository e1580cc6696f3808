//! Action execution semantics (§4.3) — the handler contract a
//! [`crate::strategy::Strategy`] invokes for each normalized instruction.

use crate::directive::{Directive, StateOp};
use crate::error::ExecutionError;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Context passed to an action alongside its params.
#[derive(Debug, Clone)]
pub struct ActionContext {
    /// The agent's current state at the time the action runs.
    pub state: Map<String, Value>,
    /// Caller-provided context merged in by the instruction.
    pub extra: Map<String, Value>,
}

/// What an action returns: a result to merge into state, any state ops to
/// apply first, and any directives to accumulate.
#[derive(Debug, Clone, Default)]
pub struct ActionSuccess {
    /// Result merged into agent state (top-level merge) after `state_ops`
    /// have been applied.
    pub result: Map<String, Value>,
    /// State ops applied to the agent state before `result` is merged and
    /// before directives are accumulated.
    pub state_ops: Vec<StateOp>,
    /// Directives accumulated from this instruction.
    pub directives: Vec<Directive>,
}

impl ActionSuccess {
    /// A success with only a result, no state ops or directives.
    pub fn result(result: Map<String, Value>) -> Self {
        Self {
            result,
            ..Default::default()
        }
    }

    /// A success with no result, only state ops.
    pub fn state_ops(state_ops: Vec<StateOp>) -> Self {
        Self {
            state_ops,
            ..Default::default()
        }
    }
}

/// The handler contract (§4.3 / GLOSSARY "Action"): receives `(params,
/// context)` and returns a result plus optional directives/state-ops, or a
/// reason the instruction failed.
#[async_trait]
pub trait Action: Send + Sync {
    /// Validate and/or coerce `params` against this action's declared
    /// schema before `run` is called. Unknown keys pass through untouched
    /// (open validation); only invalid *known* keys should fail here.
    /// Default: no validation.
    fn validate_params(&self, _params: &Map<String, Value>) -> Result<(), ExecutionError> {
        Ok(())
    }

    /// Execute the action.
    async fn run(
        &self,
        params: Map<String, Value>,
        context: ActionContext,
    ) -> Result<ActionSuccess, String>;
}

/// A lookup of action key → handler, consulted by strategies to resolve an
/// [`crate::instruction::Instruction::action`].
#[derive(Default, Clone)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under `key`, overwriting any previous handler.
    pub fn register(&mut self, key: impl Into<String>, action: Arc<dyn Action>) {
        self.actions.insert(key.into(), action);
    }

    /// Look up the handler for `key`.
    pub fn get(&self, key: &str) -> Option<Arc<dyn Action>> {
        self.actions.get(key).cloned()
    }
}
