#![deny(missing_docs)]
//! Filesystem-backed implementation of agentrt-core's [`Storage`] trait (C6).
//!
//! Checkpoints and threads each land as one percent-encoded `.json` file
//! under their own subdirectory of the store root. True persistence across
//! process restarts, at the cost of one file read/write per operation.
//!
//! Percent-encoded filenames and `tokio::fs`, with direct
//! `CheckpointKey`/`ThreadId` filenames in place of hashed scope
//! directories. `append_thread`'s optimistic-concurrency check is
//! serialized with an in-process `tokio::sync::Mutex` in a read-then-write
//! style, since the filesystem itself gives no compare-and-swap primitive
//! to lean on.

use agentrt_core::{Checkpoint, CheckpointKey, NewEntry, StorageError, Thread, ThreadId};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Filesystem-backed [`agentrt_core::Storage`].
///
/// Directory layout:
/// ```text
/// root/
///   checkpoints/
///     <percent-encoded "agent_module\0id">.json
///   threads/
///     <percent-encoded thread-id>.json
/// ```
pub struct FsStore {
    root: PathBuf,
    append_lock: Mutex<()>,
}

impl FsStore {
    /// Create a new filesystem store rooted at `root`. Subdirectories are
    /// created lazily on first write.
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            append_lock: Mutex::new(()),
        }
    }

    fn checkpoint_path(&self, key: &CheckpointKey) -> PathBuf {
        let raw = format!("{}\0{}", key.agent_module, key.id.as_str());
        self.root
            .join("checkpoints")
            .join(format!("{}.json", encode_filename(&raw)))
    }

    fn thread_path(&self, id: &ThreadId) -> PathBuf {
        self.root
            .join("threads")
            .join(format!("{}.json", encode_filename(id.as_str())))
    }
}

/// Percent-encode anything outside `[a-zA-Z0-9._-]` so ids of any shape
/// become safe single-segment filenames.
fn encode_filename(raw: &str) -> String {
    let mut encoded = String::new();
    for ch in raw.chars() {
        match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => encoded.push(ch),
            _ => {
                for byte in ch.to_string().as_bytes() {
                    encoded.push_str(&format!("%{byte:02X}"));
                }
            }
        }
    }
    encoded
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StorageError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let value = serde_json::from_str(&contents)
                .map_err(|e| StorageError::Backend(e.to_string()))?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::Backend(e.to_string())),
    }
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;
    }
    let contents =
        serde_json::to_string_pretty(value).map_err(|e| StorageError::Backend(e.to_string()))?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| StorageError::Backend(e.to_string()))
}

#[async_trait]
impl agentrt_core::Storage for FsStore {
    async fn put_checkpoint(
        &self,
        key: &CheckpointKey,
        checkpoint: Checkpoint,
    ) -> Result<(), StorageError> {
        write_json(&self.checkpoint_path(key), &checkpoint).await
    }

    async fn get_checkpoint(&self, key: &CheckpointKey) -> Result<Checkpoint, StorageError> {
        read_json(&self.checkpoint_path(key))
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("{key:?}")))
    }

    async fn delete_checkpoint(&self, key: &CheckpointKey) -> Result<(), StorageError> {
        match tokio::fs::remove_file(self.checkpoint_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Backend(e.to_string())),
        }
    }

    async fn append_thread(
        &self,
        id: &ThreadId,
        entries: Vec<NewEntry>,
        expected_rev: Option<u64>,
        now: u64,
    ) -> Result<Thread, StorageError> {
        let _guard = self.append_lock.lock().await;
        let path = self.thread_path(id);
        let current = read_json(&path)
            .await?
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
        write_json(&path, &updated).await?;
        Ok(updated)
    }

    async fn load_thread(&self, id: &ThreadId) -> Result<Thread, StorageError> {
        read_json(&self.thread_path(id))
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_core::{AgentId, Storage, CHECKPOINT_VERSION};
    use serde_json::Map;

    fn checkpoint(key: &CheckpointKey) -> Checkpoint {
        Checkpoint {
            version: CHECKPOINT_VERSION,
            agent_module: key.agent_module.clone(),
            id: key.id.clone(),
            state: Map::new(),
            thread: None,
        }
    }

    #[test]
    fn filename_encoding_is_safe_and_stable() {
        let raw = "counter\0agent/with spaces🎉";
        let encoded = encode_filename(raw);
        assert!(encoded
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '%')));
        assert_eq!(encoded, encode_filename(raw));
    }

    #[tokio::test]
    async fn write_and_read_checkpoint_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = CheckpointKey::new("counter", AgentId::new("1"));

        store.put_checkpoint(&key, checkpoint(&key)).await.unwrap();
        let loaded = store.get_checkpoint(&key).await.unwrap();
        assert_eq!(loaded.agent_module, "counter");
    }

    #[tokio::test]
    async fn get_missing_checkpoint_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = CheckpointKey::new("counter", AgentId::new("missing"));
        let err = store.get_checkpoint(&key).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_checkpoint_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = CheckpointKey::new("counter", AgentId::new("1"));

        store.put_checkpoint(&key, checkpoint(&key)).await.unwrap();
        store.delete_checkpoint(&key).await.unwrap();
        store.delete_checkpoint(&key).await.unwrap();
        assert!(store.get_checkpoint(&key).await.is_err());
    }

    #[tokio::test]
    async fn append_thread_persists_across_store_instances() {
        let dir = tempfile::tempdir().unwrap();
        let id = ThreadId::new("t1");

        {
            let store = FsStore::new(dir.path());
            store
                .append_thread(&id, vec![NewEntry::new("a", Map::new())], None, 100)
                .await
                .unwrap();
        }

        let store = FsStore::new(dir.path());
        let loaded = store.load_thread(&id).await.unwrap();
        assert_eq!(loaded.rev, 1);
        assert_eq!(loaded.entries[0].kind, "a");
    }

    #[tokio::test]
    async fn append_thread_rejects_stale_expected_rev() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let id = ThreadId::new("t1");

        store
            .append_thread(&id, vec![NewEntry::new("a", Map::new())], None, 100)
            .await
            .unwrap();

        let err = store
            .append_thread(&id, vec![NewEntry::new("b", Map::new())], Some(0), 200)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StorageError::RevisionConflict {
                expected: 0,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn load_missing_thread_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let err = store.load_thread(&ThreadId::new("missing")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn checkpoints_and_threads_are_namespaced_separately() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let key = CheckpointKey::new("same-id", AgentId::new("x"));
        store.put_checkpoint(&key, checkpoint(&key)).await.unwrap();

        let id = ThreadId::new("x");
        store
            .append_thread(&id, vec![NewEntry::new("a", Map::new())], None, 100)
            .await
            .unwrap();

        assert!(store.get_checkpoint(&key).await.is_ok());
        assert!(store.load_thread(&id).await.is_ok());
    }
}
