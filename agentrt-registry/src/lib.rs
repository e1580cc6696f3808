#![deny(missing_docs)]
//! Registry (C9) — a unique `id → handle` mapping for agent process
//! handles. Startup collision (the same id registered twice while still
//! live) is a hard error; deregistration happens automatically when the
//! [`Registration`] guard returned by `register` is dropped, mirroring
//! an actor registry's "deregister on process death."
//!
//! A `HashMap<AgentId, H>` behind an `RwLock` with an `ok_or_else` lookup
//! pattern, extended with explicit collision detection on insert: a plain
//! map would silently overwrite, and a duplicate id here needs to be a
//! hard error instead.

use agentrt_core::{AgentId, ConfigError};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A unique `AgentId → handle` registry.
///
/// `H` is whatever a caller uses to address a running agent process — a
/// channel sender, a task `JoinHandle`, an RPC stub. The registry itself
/// is agnostic to what `H` means; it only enforces uniqueness.
#[derive(Clone)]
pub struct Registry<H: Clone> {
    inner: Arc<RwLock<HashMap<AgentId, H>>>,
}

impl<H: Clone> Default for Registry<H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<H: Clone> Registry<H> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Register `handle` under `id`.
    ///
    /// Returns [`ConfigError::DuplicateId`] if `id` is already registered.
    /// On success, returns a [`Registration`] guard: dropping it removes
    /// the entry, so tying the guard's lifetime to the agent process's own
    /// lifetime gives automatic deregistration on process death.
    pub fn register(&self, id: AgentId, handle: H) -> Result<Registration<H>, ConfigError> {
        let mut map = self.inner.write().expect("registry lock poisoned");
        if map.contains_key(&id) {
            return Err(ConfigError::DuplicateId(id.to_string()));
        }
        map.insert(id.clone(), handle);
        Ok(Registration {
            id,
            registry: self.inner.clone(),
            active: true,
        })
    }

    /// Look up the handle registered under `id`.
    pub fn lookup(&self, id: &AgentId) -> Option<H> {
        self.inner.read().expect("registry lock poisoned").get(id).cloned()
    }

    /// Whether `id` currently has a live registration.
    pub fn contains(&self, id: &AgentId) -> bool {
        self.inner.read().expect("registry lock poisoned").contains_key(id)
    }

    /// All currently-registered ids. O(n).
    pub fn list(&self) -> Vec<AgentId> {
        self.inner
            .read()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Number of currently-registered ids. O(1).
    pub fn count(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").len()
    }

    /// Forcibly remove `id`, bypassing the guard. Used by supervisors that
    /// need to evict a dead entry without holding its [`Registration`].
    pub fn deregister(&self, id: &AgentId) {
        self.inner.write().expect("registry lock poisoned").remove(id);
    }
}

/// A live registration in a [`Registry`]. Dropping this removes the entry.
///
/// `std::mem::forget`-ing a `Registration` leaks the map entry rather than
/// causing unsafety; callers that need to hand off ownership of the
/// registration should move the guard, not forget it.
pub struct Registration<H: Clone> {
    id: AgentId,
    registry: Arc<RwLock<HashMap<AgentId, H>>>,
    active: bool,
}

impl<H: Clone> Registration<H> {
    /// The id this guard holds a registration for.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Release this registration, removing the entry immediately instead
    /// of waiting for drop.
    pub fn release(mut self) {
        self.deregister_once();
    }

    fn deregister_once(&mut self) {
        if self.active {
            self.registry
                .write()
                .expect("registry lock poisoned")
                .remove(&self.id);
            self.active = false;
        }
    }
}

impl<H: Clone> Drop for Registration<H> {
    fn drop(&mut self) {
        self.deregister_once();
    }
}
