#![deny(missing_docs)]
//! A third-party [`Strategy`] implementation, kept outside the `agentrt-*`
//! crate set to demonstrate that strategies are a pluggable extension
//! point: nothing here has special access to `agentrt-core` beyond the
//! public `Strategy`/`Action` contracts.
//!
//! `BarrierStrategy` runs every instruction in a `cmd` call against the
//! *same* starting snapshot — each sees the pre-barrier state, never a
//! sibling's in-progress result — and only commits if every one of them
//! succeeds. Unlike the shipped `Direct` strategy (sequential, partial state
//! survives a mid-list failure), a barrier either lands all of its effects
//! or none of them: useful when a batch of instructions represents one
//! logical unit (e.g. "reserve inventory for every line item in this
//! order").

use agentrt_core::{
    Action, ActionContext, Agent, AgentRuntimeError, Directive, Instruction, RouteHint, StateOp,
    Strategy, StrategyContext,
};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

/// Executes every instruction in a `cmd` call against a shared starting
/// snapshot and commits their combined effect only if all of them succeed.
pub struct BarrierStrategy;

impl BarrierStrategy {
    /// A fresh barrier strategy. Stateless — safe to share behind one `Arc`
    /// across every agent that uses it.
    pub fn new() -> Self {
        Self
    }
}

impl Default for BarrierStrategy {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_one(
    action: Option<Arc<dyn Action>>,
    instr: &Instruction,
    snapshot: &Map<String, Value>,
) -> Result<(Vec<StateOp>, Map<String, Value>, Vec<Directive>), String> {
    let action = action.ok_or_else(|| format!("unknown action: {}", instr.action))?;
    action.validate_params(&instr.params).map_err(|e| e.to_string())?;
    let success = action
        .run(
            instr.params.clone(),
            ActionContext {
                state: snapshot.clone(),
                extra: instr.context.clone(),
            },
        )
        .await?;
    Ok((success.state_ops, success.result, success.directives))
}

#[async_trait]
impl Strategy for BarrierStrategy {
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
        if instructions.is_empty() {
            return Ok((agent.clone(), Vec::new()));
        }

        let snapshot = agent.state.clone();
        let attempts = run_all_against_snapshot(&instructions, &snapshot, ctx).await;

        let mut failed = None;
        for (instr, result) in instructions.iter().zip(attempts.iter()) {
            if let Err(reason) = result {
                failed = Some((instr.action.clone(), reason.clone()));
                break;
            }
        }

        if let Some((action, reason)) = failed {
            return Ok((
                agent.clone(),
                vec![Directive::Error {
                    error: format!("barrier aborted: {action} failed: {reason}"),
                    context: Some("barrier".to_string()),
                }],
            ));
        }

        let mut next = agent.clone();
        let mut directives = Vec::new();
        for result in attempts {
            let (state_ops, result_map, mut instr_directives) = result.expect("checked above");
            for op in state_ops {
                op.apply(&mut next.state);
            }
            StateOp::SetState { attrs: result_map }.apply(&mut next.state);
            directives.append(&mut instr_directives);
        }
        Ok((next, directives))
    }

    fn signal_routes(&self) -> Vec<RouteHint> {
        Vec::new()
    }
}

/// Run every instruction against the same `snapshot`, one after another —
/// none of them observes another's result, only the pre-barrier state, so
/// the order they run in doesn't affect what they see. Named distinctly
/// from `cmd`'s own loop so that "all instructions see the same pre-barrier
/// state" invariant is visually obvious at the call site, not just implied
/// by argument order.
async fn run_all_against_snapshot(
    instructions: &[Instruction],
    snapshot: &Map<String, Value>,
    ctx: &StrategyContext,
) -> Vec<Result<(Vec<StateOp>, Map<String, Value>, Vec<Directive>), String>> {
    let mut out = Vec::with_capacity(instructions.len());
    for instr in instructions {
        let action = ctx.actions.get(&instr.action);
        out.push(run_one(action, instr, snapshot).await);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_core::{ActionRegistry, ActionSuccess, AgentId, Schema};
    use serde_json::{json, Map as JsonMap};

    struct ReserveItem;

    #[async_trait]
    impl Action for ReserveItem {
        async fn run(&self, params: JsonMap<String, Value>, context: ActionContext) -> Result<ActionSuccess, String> {
            let sku = params.get("sku").and_then(|v| v.as_str()).unwrap_or_default();
            if sku.is_empty() {
                return Err("missing sku".to_string());
            }
            let reserved_key = format!("reserved_{sku}");
            if context.state.contains_key(&reserved_key) {
                return Err(format!("{sku} already reserved"));
            }
            let mut result = JsonMap::new();
            result.insert(reserved_key, json!(true));
            Ok(ActionSuccess::result(result))
        }
    }

    fn test_agent() -> Agent {
        Agent::new(
            AgentId::new("order-1"),
            "order",
            Arc::new(Schema::none()),
            Arc::new(BarrierStrategy::new()),
            JsonMap::new(),
            false,
        )
        .unwrap()
    }

    fn ctx() -> StrategyContext {
        let mut actions = ActionRegistry::new();
        actions.register("reserve", Arc::new(ReserveItem));
        StrategyContext::new(Arc::new(actions), 0)
    }

    #[tokio::test]
    async fn all_instructions_commit_when_every_one_succeeds() {
        let agent = test_agent();
        let action = json!([
            ["reserve", {"sku": "widget"}],
            ["reserve", {"sku": "gadget"}],
        ]);
        let (next, directives) = agent.cmd(&action, &ctx()).await.unwrap();
        assert!(directives.is_empty());
        assert_eq!(next.state.get("reserved_widget").unwrap(), &json!(true));
        assert_eq!(next.state.get("reserved_gadget").unwrap(), &json!(true));
    }

    #[tokio::test]
    async fn no_instruction_commits_when_any_one_fails() {
        let agent = test_agent();
        let action = json!([
            ["reserve", {"sku": "widget"}],
            ["reserve", {}],
        ]);
        let (next, directives) = agent.cmd(&action, &ctx()).await.unwrap();
        assert_eq!(directives.len(), 1);
        assert!(matches!(&directives[0], Directive::Error { .. }));
        assert!(next.state.get("reserved_widget").is_none(), "partial commit leaked through the barrier");
    }

    #[tokio::test]
    async fn empty_instruction_list_is_a_no_op() {
        let agent = test_agent();
        let (next, directives) = agent.cmd(&json!([]), &ctx()).await.unwrap();
        assert!(directives.is_empty());
        assert_eq!(next.state, agent.state);
    }
}
