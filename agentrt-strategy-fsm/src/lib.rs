#![deny(missing_docs)]
//! FSM strategy (C8) — attaches a finite-state sub-model to the agent and
//! gates instruction execution on transitions defined by a caller-supplied
//! table.
//!
//! Repeatedly re-evaluates what's permitted next and transitions state
//! accordingly, generalized from a fixed reason-act-observe cycle to an
//! arbitrary caller-defined transition table over [`Instruction`] actions.

use agentrt_core::{
    Action, ActionContext, Agent, AgentId, AgentRuntimeError, Directive, Instruction, NewEntry,
    RouteHint, StateOp, Strategy, StrategyContext, Thread, ThreadId,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// The sub-state an [`FsmStrategy`] keeps at `agent.state.__strategy__`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FsmState {
    /// Always `"ready"` once `init` has run.
    pub status: String,
    /// The current named state in the transition table.
    pub fsm_state: String,
}

/// A transition table: for each named state, which actions are permitted
/// and which state they lead to.
///
/// An action absent from the current state's map is not permitted; a `cmd`
/// call that reaches such an instruction emits an `Error` directive and
/// stops, exactly like an action failure.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    states: HashMap<String, HashMap<String, String>>,
}

impl TransitionTable {
    /// An empty table — no actions are permitted in any state until added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `action` in `from`, transitioning to `to` on success.
    pub fn allow(
        mut self,
        from: impl Into<String>,
        action: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.states
            .entry(from.into())
            .or_default()
            .insert(action.into(), to.into());
        self
    }

    fn next_state(&self, from: &str, action: &str) -> Option<&str> {
        self.states.get(from)?.get(action).map(String::as_str)
    }
}

/// Execute instructions gated by a [`TransitionTable`]: an instruction is
/// only run if its action is permitted in the agent's current `fsm_state`;
/// a successful run transitions to the table's target state.
///
/// When constructed with `journal: true`, also appends
/// `instruction_start`/`instruction_end` entries plus `checkpoint{event:
/// init|transition, fsm_state}` entries to `state.__thread__`.
pub struct FsmStrategy {
    initial_state: String,
    table: TransitionTable,
    journal: bool,
}

impl FsmStrategy {
    /// Build a strategy starting in `initial_state`, gated by `table`.
    pub fn new(initial_state: impl Into<String>, table: TransitionTable) -> Self {
        Self {
            initial_state: initial_state.into(),
            table,
            journal: false,
        }
    }

    /// Enable journalling of `instruction_start`/`instruction_end`/
    /// `checkpoint` entries.
    pub fn with_journal(mut self) -> Self {
        self.journal = true;
        self
    }
}

fn read_fsm_state(state: &Map<String, Value>) -> Option<FsmState> {
    state
        .get("__strategy__")
        .and_then(|v| serde_json::from_value(v.clone()).ok())
}

fn write_fsm_state(state: &mut Map<String, Value>, fsm: &FsmState) {
    state.insert(
        "__strategy__".to_string(),
        serde_json::to_value(fsm).expect("FsmState always serializes"),
    );
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

fn checkpoint_payload(event: &str, fsm_state: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("event".to_string(), Value::String(event.to_string()));
    payload.insert("fsm_state".to_string(), Value::String(fsm_state.to_string()));
    payload
}

async fn run_instruction(
    action: Option<Arc<dyn Action>>,
    instr: &Instruction,
    state: &mut Map<String, Value>,
) -> Result<Vec<Directive>, String> {
    let action = action.ok_or_else(|| format!("unknown action: {}", instr.action))?;
    action.validate_params(&instr.params).map_err(|e| e.to_string())?;

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
impl Strategy for FsmStrategy {
    async fn init(
        &self,
        agent: &Agent,
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
        let mut next = agent.clone();
        let fsm = FsmState {
            status: "ready".to_string(),
            fsm_state: self.initial_state.clone(),
        };
        write_fsm_state(&mut next.state, &fsm);

        if self.journal {
            let thread = load_thread(&next.state, &next.id, ctx.now);
            let thread = thread.append(
                vec![NewEntry::new(
                    "checkpoint",
                    checkpoint_payload("init", &fsm.fsm_state),
                )],
                ctx.now,
            );
            store_thread(&mut next.state, thread);
        }

        Ok((next, Vec::new()))
    }

    async fn cmd(
        &self,
        agent: &Agent,
        instructions: Vec<Instruction>,
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
        let mut next = agent.clone();
        let mut directives = Vec::new();
        let mut fsm = read_fsm_state(&next.state).unwrap_or_else(|| FsmState {
            status: "ready".to_string(),
            fsm_state: self.initial_state.clone(),
        });

        for instr in &instructions {
            let target = self
                .table
                .next_state(&fsm.fsm_state, &instr.action)
                .map(str::to_string);

            if target.is_none() {
                directives.push(Directive::Error {
                    error: format!(
                        "action {:?} not permitted in fsm state {:?}",
                        instr.action, fsm.fsm_state
                    ),
                    context: Some(instr.action.clone()),
                });
                break;
            }

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
                    fsm.fsm_state = target.expect("checked is_none above");
                    write_fsm_state(&mut next.state, &fsm);

                    if self.journal {
                        let thread = load_thread(&next.state, &next.id, ctx.now);
                        let thread = thread.append(
                            vec![NewEntry::new(
                                "checkpoint",
                                checkpoint_payload("transition", &fsm.fsm_state),
                            )],
                            ctx.now,
                        );
                        store_thread(&mut next.state, thread);
                    }
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

        write_fsm_state(&mut next.state, &fsm);
        Ok((next, directives))
    }

    fn signal_routes(&self) -> Vec<RouteHint> {
        Vec::new()
    }
}
