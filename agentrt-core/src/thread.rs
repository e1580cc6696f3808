//! Thread / Journal (C5) — an append-only log of interaction entries with
//! monotonic `seq` and `rev`. Value-semantic; mutation is pure-functional.

use crate::id::ThreadId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single journal entry. Entries are never modified or removed once
/// appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Entry {
    /// Unique id, generated on append if not supplied.
    pub id: String,
    /// Zero-based position within the thread; `entries[i].seq == i`.
    pub seq: u64,
    /// Milliseconds since epoch; defaulted to "now" on append if missing.
    pub at: u64,
    /// A short tag describing the entry kind (e.g. `"instruction_start"`).
    pub kind: String,
    /// Entry payload. Param *values* are never journalled by strategies —
    /// only key names — unless an action explicitly opts in.
    pub payload: Map<String, Value>,
    /// Cross-references (e.g. correlation/causation ids).
    #[serde(default)]
    pub refs: Map<String, Value>,
}

/// A new entry awaiting assignment of `id`/`seq`/`at` by [`Thread::append`].
#[derive(Debug, Clone)]
pub struct NewEntry {
    /// Optional caller-supplied id; generated if absent.
    pub id: Option<String>,
    /// Optional caller-supplied timestamp; defaulted to "now" if absent.
    pub at: Option<u64>,
    /// Entry kind tag.
    pub kind: String,
    /// Entry payload.
    pub payload: Map<String, Value>,
    /// Cross-references.
    pub refs: Map<String, Value>,
}

impl NewEntry {
    /// Build a new entry with the given kind and payload, no explicit id,
    /// timestamp, or refs.
    pub fn new(kind: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self {
            id: None,
            at: None,
            kind: kind.into(),
            payload,
            refs: Map::new(),
        }
    }
}

/// An append-only interaction log.
///
/// Invariants: `entries` is strictly `seq`-ordered from 0; `rev` is
/// monotonic non-decreasing across persisted revisions; `rev == entries.len()`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thread {
    /// Identifies this thread for storage lookups.
    pub id: ThreadId,
    /// Current revision — always equal to `entries.len()`.
    pub rev: u64,
    /// Ordered, `seq`-indexed entries.
    pub entries: Vec<Entry>,
    /// Milliseconds since epoch when the thread was first created.
    pub created_at: u64,
    /// Milliseconds since epoch of the most recent append.
    pub updated_at: u64,
    /// Free-form metadata.
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Thread {
    /// Build an empty thread stamped at `now`.
    pub fn new(id: ThreadId, now: u64) -> Self {
        Self {
            id,
            rev: 0,
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
            metadata: Map::new(),
        }
    }

    /// Append `new_entries`, assigning sequential `seq` starting at
    /// `self.entries.len()`. Returns a new thread; `self` is untouched.
    ///
    /// `now` is used to stamp any entry that didn't supply its own `at`,
    /// and becomes the new thread's `updated_at`.
    pub fn append(&self, new_entries: Vec<NewEntry>, now: u64) -> Thread {
        let mut entries = self.entries.clone();
        let mut seq = entries.len() as u64;
        for new_entry in new_entries {
            entries.push(Entry {
                id: new_entry.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
                seq,
                at: new_entry.at.unwrap_or(now),
                kind: new_entry.kind,
                payload: new_entry.payload,
                refs: new_entry.refs,
            });
            seq += 1;
        }
        let rev = entries.len() as u64;
        Thread {
            id: self.id.clone(),
            rev,
            entries,
            created_at: self.created_at,
            updated_at: now,
            metadata: self.metadata.clone(),
        }
    }

    /// Entries with `seq` strictly greater than `known_rev` — the slice a
    /// hibernate call still needs to flush to storage.
    pub fn entries_since(&self, known_rev: u64) -> &[Entry] {
        let start = known_rev.min(self.entries.len() as u64) as usize;
        &self.entries[start..]
    }
}
