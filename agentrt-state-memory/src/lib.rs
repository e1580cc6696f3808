#![deny(missing_docs)]
//! In-memory implementation of agentrt-core's [`Storage`] trait (C6).
//!
//! Uses `HashMap`s behind `RwLock`s for concurrent access. Suitable for
//! testing, prototyping, and single-process deployments where persistence
//! across restarts is not required.
//!
//! A `HashMap` behind a `tokio::sync::RwLock`, keyed around
//! [`CheckpointKey`]/[`ThreadId`] instead of arbitrary scoped string keys,
//! and extended with the optimistic-concurrency compare-and-swap
//! `append_thread` requires.

use agentrt_core::{Checkpoint, CheckpointKey, NewEntry, StorageError, Thread, ThreadId};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// In-memory [`agentrt_core::Storage`] backed by two `HashMap`s behind
/// `RwLock`s: one for checkpoints, one for threads.
pub struct MemoryStore {
    checkpoints: RwLock<HashMap<CheckpointKey, Checkpoint>>,
    threads: RwLock<HashMap<ThreadId, Thread>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            checkpoints: RwLock::new(HashMap::new()),
            threads: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl agentrt_core::Storage for MemoryStore {
    async fn put_checkpoint(
        &self,
        key: &CheckpointKey,
        checkpoint: Checkpoint,
    ) -> Result<(), StorageError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.insert(key.clone(), checkpoint);
        Ok(())
    }

    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Checkpoint, StorageError> {
        let checkpoints = self.checkpoints.read().await;
        checkpoints
            .get(key)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(format!("{key:?}")))
    }

    async fn delete_checkpoint(&self, key: &CheckpointKey) -> Result<(), StorageError> {
        let mut checkpoints = self.checkpoints.write().await;
        checkpoints.remove(key);
        Ok(())
    }

    async fn append_thread(
        &self,
        id: &ThreadId,
        entries: Vec<NewEntry>,
        expected_rev: Option<u64>,
        now: u64,
    ) -> Result<Thread, StorageError> {
        let mut threads = self.threads.write().await;
        let current = threads
            .get(id)
            .cloned()
            .unwrap_or_else(|| Thread::new(id.clone(), now));

        if let Some(expected) = expected_rev {
            if expected != current.rev {
                return Err(StorageError::RevisionConflict {
                    expected,
                    actual: current.rev,
                });
            }
        }

        let updated = current.append(entries, now);
        threads.insert(id.clone(), updated.clone());
        Ok(updated)
    }

    async fn load_thread(&self, id: &ThreadId) -> Result<Thread, StorageError> {
        let threads = self.threads.read().await;
        threads
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}
