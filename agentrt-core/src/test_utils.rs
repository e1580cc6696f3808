//! In-process test collaborators (ambient test tooling, feature-gated
//! behind `test-utils` since they pull in `tokio` for async trait methods).
//!
//! Downstream crates (`agentrt-server`, `agentrt-strategy-*`) depend on this
//! module under `[dev-dependencies]` rather than re-implementing the same
//! mocks per crate.

use crate::action::{Action, ActionContext, ActionSuccess};
use crate::agent::Agent;
use crate::directive::Directive;
use crate::error::StorageError;
use crate::id::{AgentId, ThreadId};
use crate::instruction::Instruction;
use crate::schema::Schema;
use crate::storage::{Checkpoint, CheckpointKey, Storage};
use crate::strategy::{RouteHint, Strategy, StrategyContext};
use crate::thread::{NewEntry, Thread};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An in-memory [`Storage`] impl, identical in shape to
/// `agentrt-state-memory`'s `MemoryStore` but kept here so `agentrt-core`'s
/// own tests (and any crate that only needs a throwaway backend) don't have
/// to depend on that crate.
#[derive(Default)]
pub struct MockStorage {
    checkpoints: Mutex<HashMap<CheckpointKey, Checkpoint>>,
    threads: Mutex<HashMap<ThreadId, Thread>>,
}

impl MockStorage {
    /// An empty mock store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn put_checkpoint(&self, key: &CheckpointKey, checkpoint: Checkpoint) -> Result<(), StorageError> {
        self.checkpoints
            .lock()
            .expect("mock storage lock poisoned")
            .insert(key.clone(), checkpoint);
        Ok(())
    }

    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Checkpoint, StorageError> {
        self.checkpoints
            .lock()
            .expect("mock storage lock poisoned")
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", key.agent_module, key.id)))
    }

    async fn delete_checkpoint(&self, key: &CheckpointKey) -> Result<(), StorageError> {
        self.checkpoints
            .lock()
            .expect("mock storage lock poisoned")
            .remove(key);
        Ok(())
    }

    async fn append_thread(
        &self,
        id: &ThreadId,
        entries: Vec<NewEntry>,
        expected_rev: Option<u64>,
        now: u64,
    ) -> Result<Thread, StorageError> {
        let mut threads = self.threads.lock().expect("mock storage lock poisoned");
        let current = threads
            .get(id)
            .cloned()
            .unwrap_or_else(|| Thread::new(id.clone(), now));
        if let Some(expected) = expected_rev {
            if current.rev != expected {
                return Err(StorageError::RevisionConflict {
                    expected,
                    actual: current.rev,
                });
            }
        }
        let next = current.append(entries, now);
        threads.insert(id.clone(), next.clone());
        Ok(next)
    }

    async fn load_thread(&self, id: &ThreadId) -> Result<Thread, StorageError> {
        self.threads
            .lock()
            .expect("mock storage lock poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}

/// A [`Strategy`] that counts how many times `cmd` ran and echoes the last
/// instruction's action back as `state.last_action`. Used by `agentrt-server`
/// tests to assert signal intake actually reached the agent core.
#[derive(Default)]
pub struct CountingStrategy {
    calls: Arc<AtomicUsize>,
}

impl CountingStrategy {
    /// A fresh counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable handle to this strategy's call counter, so a test can
    /// assert on it after handing the strategy itself into an `Agent`.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Strategy for CountingStrategy {
    async fn init(
        &self,
        agent: &Agent,
        _ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), crate::error::AgentRuntimeError> {
        Ok((agent.clone(), Vec::new()))
    }

    async fn cmd(
        &self,
        agent: &Agent,
        instructions: Vec<Instruction>,
        _ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), crate::error::AgentRuntimeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut next = agent.clone();
        if let Some(last) = instructions.last() {
            next.state
                .insert("last_action".to_string(), Value::String(last.action.clone()));
        }
        Ok((next, Vec::new()))
    }

    fn signal_routes(&self) -> Vec<RouteHint> {
        Vec::new()
    }
}

/// An [`Action`] that counts invocations and increments `state.count` by
/// `params.by` (default 1).
#[derive(Default)]
pub struct CountingHandler {
    calls: Arc<AtomicUsize>,
}

impl CountingHandler {
    /// A fresh counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// A cloneable handle to this handler's invocation counter.
    pub fn counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

#[async_trait]
impl Action for CountingHandler {
    async fn run(&self, params: Map<String, Value>, context: ActionContext) -> Result<ActionSuccess, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let by = params.get("by").and_then(|v| v.as_i64()).unwrap_or(1);
        let current = context.state.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
        let mut result = Map::new();
        result.insert("count".to_string(), Value::from(current + by));
        Ok(ActionSuccess::result(result))
    }
}

/// Build a bare test agent: empty schema, the given strategy, id `"test"`.
pub fn test_agent(strategy: Arc<dyn Strategy>) -> Agent {
    Agent::new(
        AgentId::new("test"),
        "test_module",
        Arc::new(Schema::none()),
        strategy,
        Map::new(),
        false,
    )
    .expect("bare schema never rejects empty state")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_storage_round_trips_a_checkpoint() {
        let storage = MockStorage::new();
        let key = CheckpointKey::new("counter", AgentId::new("a1"));
        let checkpoint = Checkpoint {
            version: crate::storage::CHECKPOINT_VERSION,
            agent_module: "counter".to_string(),
            id: AgentId::new("a1"),
            state: Map::new(),
            thread: None,
        };
        storage.put_checkpoint(&key, checkpoint).await.unwrap();
        let loaded = storage.get_checkpoint(&key).await.unwrap();
        assert_eq!(loaded.agent_module, "counter");
    }

    #[tokio::test]
    async fn mock_storage_rejects_stale_expected_rev() {
        let storage = MockStorage::new();
        let id = ThreadId::new("t1");
        storage
            .append_thread(&id, vec![NewEntry::new("a", Map::new())], None, 0)
            .await
            .unwrap();
        let err = storage
            .append_thread(&id, vec![NewEntry::new("b", Map::new())], Some(0), 1)
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn counting_strategy_tracks_calls_and_last_action() {
        let strategy = CountingStrategy::new();
        let counter = strategy.counter();
        let agent = test_agent(Arc::new(strategy));
        let ctx = StrategyContext::new(Arc::new(crate::action::ActionRegistry::new()), 0);
        let (next, _) = agent.cmd(&Value::String("ping".to_string()), &ctx).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(next.state.get("last_action").unwrap(), "ping");
    }
}
