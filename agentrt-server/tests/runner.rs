//! End-to-end tests: a real [`Agent`] wired to a real [`DirectStrategy`],
//! driven entirely through [`AgentServer`]/[`AgentHandle`] — no direct
//! calls into `Agent::cmd`. Exercises signal intake, directive draining,
//! backpressure, parent/child hierarchy, and hibernate/thaw.

use agentrt_core::{
    Action, ActionContext, ActionRegistry, ActionSuccess, Agent, AgentId, ChildTag, Schema,
    Signal, StateOp,
};
use agentrt_registry::Registry;
use agentrt_server::{
    AgentFactory, AgentServer, OnParentDeath, ServerContext, ServerOptions,
};
use agentrt_state_memory::MemoryStore;
use agentrt_strategy_direct::DirectStrategy;
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Duration;

struct Increment;

#[async_trait]
impl Action for Increment {
    async fn run(&self, params: Map<String, Value>, context: ActionContext) -> Result<ActionSuccess, String> {
        let by = params.get("by").and_then(|v| v.as_i64()).unwrap_or(1);
        let current = context.state.get("counter").and_then(|v| v.as_i64()).unwrap_or(0);
        Ok(ActionSuccess::state_ops(vec![StateOp::SetPath {
            path: "counter".to_string(),
            value: json!(current + by),
        }]))
    }
}

fn counter_agent(id: &str) -> Agent {
    Agent::new(
        AgentId::new(id),
        "counter",
        Arc::new(Schema::none()),
        Arc::new(DirectStrategy::new()),
        Map::new(),
        false,
    )
    .unwrap()
}

fn ctx_with_increment() -> ServerContext {
    let mut actions = ActionRegistry::new();
    actions.register("increment", Arc::new(Increment));
    ServerContext::new(Arc::new(actions), Registry::new())
}

#[tokio::test]
async fn counter_increments_via_call_and_view_reflects_new_state() {
    let agent = counter_agent("c1");
    let (handle, _join) = AgentServer::start(agent, ServerOptions::default(), ctx_with_increment(), None).unwrap();

    let view = handle.call(Signal::new("test", "increment"), 1_000).await.unwrap();
    assert_eq!(view["counter"], json!(1));

    let view = handle
        .call(
            Signal::new("test", "increment").with_data(json!({"by": 5})),
            1_000,
        )
        .await
        .unwrap();
    assert_eq!(view["counter"], json!(6));

    handle.stop("done").await.unwrap();
}

#[tokio::test]
async fn repeated_calls_apply_in_order_with_no_interleaving() {
    // Each call's directives fully drain before the reply is sent, so ten
    // sequential calls against the same agent must land a monotonic +1
    // each time (§8.2 directive ordering).
    let agent = counter_agent("c2");
    let (handle, _join) = AgentServer::start(agent, ServerOptions::default(), ctx_with_increment(), None).unwrap();

    for _ in 0..10 {
        handle.call(Signal::new("test", "increment"), 1_000).await.unwrap();
    }
    let view = handle.state().await.unwrap();
    assert_eq!(view["counter"], json!(10));
    handle.stop("done").await.unwrap();
}

#[tokio::test]
async fn queue_overflow_is_reported_without_blocking_the_caller() {
    let agent = counter_agent("c3");
    let options = ServerOptions::default().with_max_queue_size(1);
    let (handle, _join) = AgentServer::start(agent, options, ctx_with_increment(), None).unwrap();

    // Saturate the one-slot mailbox with casts sent back-to-back, before
    // the task gets a chance to drain any of them; at least one admission
    // must be rejected by `admit()` before ever touching the channel.
    let mut rejected = 0;
    for _ in 0..20 {
        if handle.cast(Signal::new("test", "increment")).await.is_err() {
            rejected += 1;
        }
    }
    assert!(rejected > 0, "expected at least one queue_overflow rejection");
    handle.stop("done").await.unwrap();
}

struct ChildFactory;

#[async_trait]
impl AgentFactory for ChildFactory {
    async fn build(&self, child_spec: Value, _parent: &AgentId) -> Result<Agent, agentrt_core::AgentRuntimeError> {
        let id = child_spec
            .get("id")
            .and_then(|v| v.as_str())
            .unwrap_or("child")
            .to_string();
        Ok(counter_agent(&id))
    }
}

#[tokio::test]
async fn start_link_registers_child_and_deregisters_it_on_exit() {
    let mut actions = ActionRegistry::new();
    actions.register("increment", Arc::new(Increment));
    let registry = Registry::new();
    let ctx = ServerContext::new(Arc::new(actions), registry).with_factory(Arc::new(ChildFactory));

    let parent = counter_agent("parent1");
    let (parent_handle, _join) = AgentServer::start(parent, ServerOptions::default(), ctx.clone(), None).unwrap();

    let child = counter_agent("child1");
    let child_handle = AgentServer::start_link(
        &parent_handle,
        child,
        ServerOptions::default(),
        ctx,
        None,
        ChildTag::new("worker"),
    )
    .await
    .unwrap();

    let snapshot = parent_handle.snapshot().await.unwrap();
    assert_eq!(snapshot.children, vec![ChildTag::new("worker")]);

    child_handle.stop("finished").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = parent_handle.snapshot().await.unwrap();
    assert!(snapshot.children.is_empty(), "child exit should deregister the tag");

    parent_handle.stop("done").await.unwrap();
}

#[tokio::test]
async fn on_parent_death_stop_terminates_child_after_parent_exits() {
    let ctx = ctx_with_increment();
    let parent = counter_agent("parent2");
    let (parent_handle, _join) = AgentServer::start(parent, ServerOptions::default(), ctx.clone(), None).unwrap();

    let child = counter_agent("child2");
    let child_options = ServerOptions::default().with_on_parent_death(OnParentDeath::StopSelf);
    let child_handle = AgentServer::start_link(
        &parent_handle,
        child,
        child_options,
        ctx,
        None,
        ChildTag::new("worker"),
    )
    .await
    .unwrap();

    parent_handle.stop("parent done").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!child_handle.alive(), "child should stop once its parent dies");
}

#[tokio::test]
async fn on_parent_death_continue_keeps_the_child_alive() {
    let ctx = ctx_with_increment();
    let parent = counter_agent("parent3");
    let (parent_handle, _join) = AgentServer::start(parent, ServerOptions::default(), ctx.clone(), None).unwrap();

    let child = counter_agent("child3");
    let child_options = ServerOptions::default().with_on_parent_death(OnParentDeath::Continue);
    let child_handle = AgentServer::start_link(
        &parent_handle,
        child,
        child_options,
        ctx,
        None,
        ChildTag::new("worker"),
    )
    .await
    .unwrap();

    parent_handle.stop("parent done").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(child_handle.alive(), "child with Continue policy should stay alive after its parent dies");

    child_handle.stop("done").await.unwrap();
}

#[tokio::test]
async fn hibernate_then_thaw_round_trips_counter_state() {
    let agent = counter_agent("c4");
    let (handle, _join) = AgentServer::start(agent, ServerOptions::default(), ctx_with_increment(), None).unwrap();
    handle
        .call(Signal::new("test", "increment").with_data(json!({"by": 7})), 1_000)
        .await
        .unwrap();

    let storage = MemoryStore::new();
    let view = handle.state().await.unwrap();
    let live = Agent::new(
        AgentId::new("c4"),
        "counter",
        Arc::new(Schema::none()),
        Arc::new(DirectStrategy::new()),
        view.as_object().cloned().unwrap_or_default(),
        false,
    )
    .unwrap();

    agentrt_server::hibernate(&live, &storage, 1_000).await.unwrap();
    let thawed = agentrt_server::thaw(
        "counter",
        &AgentId::new("c4"),
        &storage,
        Arc::new(Schema::none()),
        Arc::new(DirectStrategy::new()),
        false,
    )
    .await
    .unwrap();

    assert_eq!(thawed.state.get("counter").unwrap(), &json!(7));
    handle.stop("done").await.unwrap();
}
