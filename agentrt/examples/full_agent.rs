//! A small order-processing agent, driven end to end through the server.
//!
//! Demonstrates wiring a [`FsmStrategy`] with a transition table, a server
//! context with a couple of registered actions, and exercising the agent
//! through `AgentHandle::call`.
//!
//! Run with:
//!
//! ```sh
//! cargo run -p agentrt --example full_agent
//! ```

use agentrt::prelude::*;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;

struct Submit;

#[async_trait]
impl Action for Submit {
    async fn run(&self, params: Map<String, Value>, _context: ActionContext) -> Result<ActionSuccess, String> {
        let total = params.get("total").cloned().unwrap_or(json!(0));
        Ok(ActionSuccess::state_ops(vec![StateOp::SetPath {
            path: "total".to_string(),
            value: total,
        }]))
    }
}

struct Ship;

#[async_trait]
impl Action for Ship {
    async fn run(&self, _params: Map<String, Value>, _context: ActionContext) -> Result<ActionSuccess, String> {
        Ok(ActionSuccess::state_ops(vec![StateOp::SetPath {
            path: "tracking".to_string(),
            value: json!("TRACK-1"),
        }]))
    }
}

#[tokio::main]
async fn main() {
    let table = TransitionTable::new()
        .allow("pending", "submit", "submitted")
        .allow("submitted", "ship", "shipped");
    let strategy = Arc::new(FsmStrategy::new("pending", table));

    let agent = Agent::new(
        AgentId::new("order-1"),
        "order",
        Arc::new(Schema::none()),
        strategy,
        Map::new(),
        false,
    )
    .expect("bare schema never rejects empty state");

    let mut actions = ActionRegistry::new();
    actions.register("submit", Arc::new(Submit));
    actions.register("ship", Arc::new(Ship));
    let ctx = ServerContext::new(Arc::new(actions), Registry::new());

    let (handle, _join) = AgentServer::start(agent, ServerOptions::default(), ctx, None).expect("unique id");

    let view = handle
        .call(Signal::new("shop", "submit").with_data(json!({"total": 42})), 1_000)
        .await
        .expect("submit should succeed");
    println!("after submit: {view}");

    let view = handle
        .call(Signal::new("shop", "ship"), 1_000)
        .await
        .expect("ship should succeed");
    println!("after ship: {view}");

    handle.stop("order complete").await.expect("stop should ack");
}
