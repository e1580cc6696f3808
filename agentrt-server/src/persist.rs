//! Hibernate/thaw (C12) — the façade that freezes a running [`Agent`] down
//! to a [`Checkpoint`] plus thread tail, and rebuilds an equivalent agent
//! from one later.
//!
//! Round-trip law: `thaw(hibernate(a)) == a` modulo timestamps (§8). The
//! only state this module strips before persisting is the `__thread__`
//! bookkeeping key a journalling [`agentrt_core::Strategy`] embeds in
//! state — it is split out into its own thread record and replaced by a
//! [`ThreadPointer`] in the checkpoint, per [`Checkpoint`]'s invariant.

use agentrt_core::{
    Agent, AgentId, AgentRuntimeError, Checkpoint, CheckpointKey, NewEntry, Schema, Storage,
    StorageError, Strategy, Thread, ThreadPointer, CHECKPOINT_VERSION,
};
use std::sync::Arc;

const THREAD_STATE_KEY: &str = "__thread__";

/// Freeze `agent` into storage: split any embedded `__thread__` journal out
/// into its own thread record (appending only the entries storage doesn't
/// already have), then persist the remaining state as a [`Checkpoint`]
/// pointing at that thread.
pub async fn hibernate(agent: &Agent, storage: &dyn Storage, now: u64) -> Result<(), StorageError> {
    let mut state = agent.state.clone();
    let thread_pointer = match state.remove(THREAD_STATE_KEY) {
        None => None,
        Some(value) => {
            let thread: Thread =
                serde_json::from_value(value).map_err(|e| StorageError::Backend(e.to_string()))?;
            let known_rev = match storage.load_thread(&thread.id).await {
                Ok(existing) => existing.rev,
                Err(StorageError::NotFound(_)) => 0,
                Err(e) => return Err(e),
            };
            let delta: Vec<NewEntry> = thread
                .entries_since(known_rev)
                .iter()
                .map(|e| NewEntry {
                    id: Some(e.id.clone()),
                    at: Some(e.at),
                    kind: e.kind.clone(),
                    payload: e.payload.clone(),
                    refs: e.refs.clone(),
                })
                .collect();
            let persisted = storage
                .append_thread(&thread.id, delta, Some(known_rev), now)
                .await?;
            Some(ThreadPointer {
                id: persisted.id,
                rev: persisted.rev,
            })
        }
    };

    let checkpoint = Checkpoint {
        version: CHECKPOINT_VERSION,
        agent_module: agent.module.clone(),
        id: agent.id.clone(),
        state,
        thread: thread_pointer,
    };
    let key = CheckpointKey::new(agent.module.clone(), agent.id.clone());
    storage.put_checkpoint(&key, checkpoint).await
}

/// Rebuild an agent from its last hibernated checkpoint, re-attaching its
/// thread (if any) under `__thread__` exactly as a journalling strategy
/// would have left it.
///
/// `schema`/`strategy`/`strict` are supplied by the caller — the same
/// agent-module wiring `Agent::new` would otherwise receive — because the
/// checkpoint itself carries only data, never executable configuration.
pub async fn thaw(
    module: &str,
    id: &AgentId,
    storage: &dyn Storage,
    schema: Arc<Schema>,
    strategy: Arc<dyn Strategy>,
    strict: bool,
) -> Result<Agent, AgentRuntimeError> {
    let key = CheckpointKey::new(module, id.clone());
    let checkpoint = storage.get_checkpoint(&key).await?;
    let mut state = checkpoint.state;
    if let Some(pointer) = checkpoint.thread {
        let thread = storage.load_thread(&pointer.id).await?;
        if thread.rev < pointer.rev {
            return Err(StorageError::ThreadMismatch(format!(
                "thread {:?} is at rev {} but checkpoint points at rev {}",
                pointer.id, thread.rev, pointer.rev
            ))
            .into());
        }
        state.insert(
            THREAD_STATE_KEY.to_string(),
            serde_json::to_value(&thread).expect("Thread always serializes"),
        );
    }
    Ok(Agent::new(id.clone(), module, schema, strategy, state, strict)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_core::test_utils::{test_agent, CountingStrategy, MockStorage};
    use agentrt_core::{NewEntry as CoreNewEntry, StrategyContext};
    use serde_json::{json, Map};

    #[tokio::test]
    async fn hibernate_then_thaw_reconstructs_plain_state() {
        let storage = MockStorage::new();
        let strategy: Arc<dyn Strategy> = Arc::new(CountingStrategy::new());
        let agent = test_agent(strategy.clone());
        let agent = agent
            .set({
                let mut m = Map::new();
                m.insert("count".to_string(), json!(3));
                m
            })
            .unwrap();

        hibernate(&agent, &storage, 100).await.unwrap();
        let thawed = thaw(
            &agent.module,
            &agent.id,
            &storage,
            Arc::new(Schema::none()),
            strategy,
            false,
        )
        .await
        .unwrap();
        assert_eq!(thawed.state.get("count").unwrap(), 3);
    }

    #[tokio::test]
    async fn hibernate_splits_embedded_thread_into_its_own_record() {
        let storage = MockStorage::new();
        let strategy: Arc<dyn Strategy> = Arc::new(CountingStrategy::new());
        let agent = test_agent(strategy.clone());
        let thread = Thread::new(agentrt_core::ThreadId::new(agent.id.as_str()), 0)
            .append(vec![CoreNewEntry::new("a", Map::new()), CoreNewEntry::new("b", Map::new())], 1);
        let agent = agent
            .set({
                let mut m = Map::new();
                m.insert("__thread__".to_string(), serde_json::to_value(&thread).unwrap());
                m
            })
            .unwrap();

        hibernate(&agent, &storage, 10).await.unwrap();

        let key = CheckpointKey::new(&agent.module, agent.id.clone());
        let checkpoint = storage.get_checkpoint(&key).await.unwrap();
        assert!(checkpoint.state.get("__thread__").is_none());
        let pointer = checkpoint.thread.expect("thread pointer persisted");
        assert_eq!(pointer.rev, 2);

        let thawed = thaw(
            &agent.module,
            &agent.id,
            &storage,
            Arc::new(Schema::none()),
            strategy,
            false,
        )
        .await
        .unwrap();
        let restored: Thread = serde_json::from_value(thawed.state.get("__thread__").unwrap().clone()).unwrap();
        assert_eq!(restored.entries.len(), 2);
    }

    #[tokio::test]
    async fn repeated_hibernate_does_not_double_append_thread_entries() {
        let storage = MockStorage::new();
        let strategy: Arc<dyn Strategy> = Arc::new(CountingStrategy::new());
        let ctx = StrategyContext::new(Arc::new(agentrt_core::ActionRegistry::new()), 0);
        let agent = test_agent(strategy.clone());
        let (agent, _) = agent.cmd(&json!("tick"), &ctx).await.unwrap();
        let thread = Thread::new(agentrt_core::ThreadId::new(agent.id.as_str()), 0)
            .append(vec![CoreNewEntry::new("a", Map::new())], 1);
        let agent = agent
            .set({
                let mut m = Map::new();
                m.insert("__thread__".to_string(), serde_json::to_value(&thread).unwrap());
                m
            })
            .unwrap();

        hibernate(&agent, &storage, 5).await.unwrap();
        hibernate(&agent, &storage, 6).await.unwrap();

        let loaded = storage.load_thread(&agentrt_core::ThreadId::new(agent.id.as_str())).await.unwrap();
        assert_eq!(loaded.rev, 1);
    }

    #[tokio::test]
    async fn thaw_rejects_a_checkpoint_pointing_past_the_stored_thread() {
        let storage = MockStorage::new();
        let strategy: Arc<dyn Strategy> = Arc::new(CountingStrategy::new());
        let agent = test_agent(strategy.clone());
        let thread_id = agentrt_core::ThreadId::new(agent.id.as_str());
        storage
            .append_thread(&thread_id, vec![CoreNewEntry::new("a", Map::new())], None, 1)
            .await
            .unwrap();

        let key = CheckpointKey::new(&agent.module, agent.id.clone());
        storage
            .put_checkpoint(
                &key,
                Checkpoint {
                    version: CHECKPOINT_VERSION,
                    agent_module: agent.module.clone(),
                    id: agent.id.clone(),
                    state: Map::new(),
                    thread: Some(ThreadPointer { id: thread_id, rev: 5 }),
                },
            )
            .await
            .unwrap();

        let err = thaw(&agent.module, &agent.id, &storage, Arc::new(Schema::none()), strategy, false)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AgentRuntimeError::Storage(StorageError::ThreadMismatch(_))
        ));
    }
}
