#![deny(missing_docs)]
//! Direct strategy (C8) — the simplest shipped [`Strategy`]: execute
//! instructions in list order, stop at the first error while preserving
//! state accumulated so far.
//!
//! One pass over the work list, no branching, no retries: an arbitrary
//! ordered list of [`Instruction`]s resolved through an
//! [`agentrt_core::ActionRegistry`].

use agentrt_core::{
    Action, ActionContext, Agent, AgentId, AgentRuntimeError, Directive, ExecutionError, Instruction,
    NewEntry, RouteHint, StateOp, Strategy, StrategyContext, Thread, ThreadId,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Execute instructions in list order; on the first failure, emit an
/// `Error` directive and stop, keeping state changes already applied.
///
/// When constructed with `journal: true`, every instruction also appends
/// `instruction_start`/`instruction_end` entries to `state.__thread__`
/// (a per-agent thread, keyed by the agent's own id).
pub struct DirectStrategy {
    journal: bool,
}

impl DirectStrategy {
    /// A direct strategy with journalling disabled.
    pub fn new() -> Self {
        Self { journal: false }
    }

    /// A direct strategy that journals `instruction_start`/`instruction_end`
    /// entries to `state.__thread__`.
    pub fn with_journal() -> Self {
        Self { journal: true }
    }
}

impl Default for DirectStrategy {
    fn default() -> Self {
        Self::new()
    }
}

fn load_thread(state: &Map<String, Value>, id: &AgentId, now: u64) -> Thread {
    state
        .get("__thread__")
        .and_then(|v| serde_json::from_value::<Thread>(v.clone()).ok())
        .unwrap_or_else(|| Thread::new(ThreadId::new(id.as_str()), now))
}

fn store_thread(state: &mut Map<String, Value>, thread: Thread) {
    state.insert(
        "__thread__".to_string(),
        serde_json::to_value(thread).expect("Thread always serializes"),
    );
}

/// Resolve and invoke a single instruction's action, applying its state ops
/// and result to `state` in place. Returns the directives it produced, or
/// the error reason if the action was missing, failed validation, or
/// returned `Err`.
async fn run_instruction(
    action: Option<Arc<dyn Action>>,
    instr: &Instruction,
    state: &mut Map<String, Value>,
) -> Result<Vec<Directive>, String> {
    let action = action.ok_or_else(|| ExecutionError::UnknownAction(instr.action.clone()).to_string())?;

    action
        .validate_params(&instr.params)
        .map_err(|e| e.to_string())?;

    let success = action
        .run(
            instr.params.clone(),
            ActionContext {
                state: state.clone(),
                extra: instr.context.clone(),
            },
        )
        .await?;

    for op in success.state_ops {
        op.apply(state);
    }
    StateOp::SetState {
        attrs: success.result,
    }
    .apply(state);

    Ok(success.directives)
}

#[async_trait]
impl Strategy for DirectStrategy {
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
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
        let mut next = agent.clone();
        let mut directives = Vec::new();

        for instr in &instructions {
            if self.journal {
                let thread = load_thread(&next.state, &next.id, ctx.now);
                let param_keys: Vec<Value> =
                    instr.params.keys().map(|k| Value::String(k.clone())).collect();
                let mut payload = Map::new();
                payload.insert("action".to_string(), Value::String(instr.action.clone()));
                payload.insert("param_keys".to_string(), Value::Array(param_keys));
                let thread = thread.append(vec![NewEntry::new("instruction_start", payload)], ctx.now);
                store_thread(&mut next.state, thread);
            }

            let action = ctx.actions.get(&instr.action);
            let outcome = run_instruction(action, instr, &mut next.state).await;

            if self.journal {
                let thread = load_thread(&next.state, &next.id, ctx.now);
                let mut payload = Map::new();
                payload.insert("action".to_string(), Value::String(instr.action.clone()));
                payload.insert(
                    "status".to_string(),
                    Value::String(if outcome.is_ok() { "ok" } else { "error" }.to_string()),
                );
                let thread = thread.append(vec![NewEntry::new("instruction_end", payload)], ctx.now);
                store_thread(&mut next.state, thread);
            }

            match outcome {
                Ok(mut instr_directives) => {
                    directives.append(&mut instr_directives);
                }
                Err(reason) => {
                    directives.push(Directive::Error {
                        error: reason,
                        context: Some(instr.action.clone()),
                    });
                    break;
                }
            }
        }

        Ok((next, directives))
    }

    fn signal_routes(&self) -> Vec<RouteHint> {
        Vec::new()
    }
}
