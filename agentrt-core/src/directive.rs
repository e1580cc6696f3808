//! Directive (C3) — the closed tagged union of external effects a pure
//! [`crate::agent::Agent::cmd`] call can request, plus the internal
//! `StateOp` variants the strategy consumes before directives leave the
//! pure core.
//!
//! A tagged-enum shape of side-effect descriptions — `Emit`/`Error`/
//! `Spawn`/`Schedule`/`Stop`/`StateOp` — returned from a pure decision
//! function and interpreted elsewhere.

use crate::id::ChildTag;
use crate::signal::{DispatchConfig, Signal};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tagged description of an external effect returned from the pure core.
///
/// `Directive` never contains a `StateOp` once it leaves `Agent::cmd` — the
/// strategy applies state ops to the agent struct internally and only
/// forwards the variants below.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    /// Publish a signal externally.
    Emit {
        /// The signal to publish.
        signal: Signal,
        /// Optional dispatch override; falls back to the signal's own
        /// `dispatch`, then the server default.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        dispatch: Option<DispatchConfig>,
    },
    /// Report a structured error out-of-band. Does not change state.
    Error {
        /// A human-readable description of the error.
        error: String,
        /// Where the error originated (e.g. `"normalize"`, an action key).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        context: Option<String>,
    },
    /// Start a child agent/process.
    Spawn {
        /// Opaque spec describing how to build the child (module + opts).
        child_spec: Value,
        /// Caller-chosen tag identifying the child within this parent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tag: Option<ChildTag>,
    },
    /// Deliver `message` to self after `delay_ms`.
    Schedule {
        /// Delay before delivery, in milliseconds.
        delay_ms: u64,
        /// The message to deliver — either a full [`Signal`] or an
        /// arbitrary payload wrapped in a synthetic `"jido.scheduled"`
        /// signal at expiry.
        message: ScheduledMessage,
    },
    /// Terminate the agent process.
    Stop {
        /// The stop reason (`"normal"`, `"completed"`, an error tag, ...).
        reason: String,
    },
}

/// The payload of a `Schedule` directive: either a full signal to re-enter
/// verbatim, or an arbitrary value to be wrapped at expiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduledMessage {
    /// Re-enter this signal through intake unchanged at expiry.
    Signal(Signal),
    /// Wrap this value in a synthetic `"jido.scheduled"` signal at expiry.
    Payload(Value),
}

/// Internal state-mutation requests (§4.3). These are consumed by the
/// strategy during `Agent::cmd` and never observed outside the pure core.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StateOp {
    /// Deep-merge `attrs` into the agent's state.
    SetState {
        /// Attributes to merge.
        attrs: serde_json::Map<String, Value>,
    },
    /// Wholesale-replace the agent's state.
    ReplaceState {
        /// The new state.
        attrs: serde_json::Map<String, Value>,
    },
    /// Remove top-level keys from state.
    DeleteKeys {
        /// Keys to remove.
        keys: Vec<String>,
    },
    /// Create or overwrite a value at a nested dotted path.
    SetPath {
        /// Dotted path, e.g. `"counter"` or `"nested.field"`.
        path: String,
        /// The value to set.
        value: Value,
    },
    /// Remove a value at a nested dotted path. Missing path is a no-op.
    DeletePath {
        /// Dotted path to remove.
        path: String,
    },
}

impl StateOp {
    /// Apply this state op to `state` in place, per §4.3 semantics.
    pub fn apply(&self, state: &mut serde_json::Map<String, Value>) {
        match self {
            StateOp::SetState { attrs } => deep_merge_map(state, attrs),
            StateOp::ReplaceState { attrs } => {
                *state = attrs.clone();
            }
            StateOp::DeleteKeys { keys } => {
                for key in keys {
                    state.remove(key);
                }
            }
            StateOp::SetPath { path, value } => set_path(state, path, value.clone()),
            StateOp::DeletePath { path } => {
                delete_path(state, path);
            }
        }
    }
}

/// Deep-merge `src` into `dst`: nested objects merge recursively, all other
/// value kinds (including arrays) are replaced wholesale.
pub fn deep_merge_map(dst: &mut serde_json::Map<String, Value>, src: &serde_json::Map<String, Value>) {
    for (key, value) in src {
        match (dst.get_mut(key), value) {
            (Some(Value::Object(dst_obj)), Value::Object(src_obj)) => {
                deep_merge_map(dst_obj, src_obj);
            }
            _ => {
                dst.insert(key.clone(), value.clone());
            }
        }
    }
}

fn set_path(state: &mut serde_json::Map<String, Value>, path: &str, value: Value) {
    let segments: Vec<&str> = path.split('.').collect();
    set_path_segments(state, &segments, value);
}

fn set_path_segments(map: &mut serde_json::Map<String, Value>, segments: &[&str], value: Value) {
    match segments {
        [] => {}
        [last] => {
            map.insert((*last).to_string(), value);
        }
        [head, rest @ ..] => {
            let entry = map
                .entry((*head).to_string())
                .or_insert_with(|| Value::Object(serde_json::Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(serde_json::Map::new());
            }
            if let Value::Object(nested) = entry {
                set_path_segments(nested, rest, value);
            }
        }
    }
}

fn delete_path(state: &mut serde_json::Map<String, Value>, path: &str) {
    let segments: Vec<&str> = path.split('.').collect();
    delete_path_segments(state, &segments);
}

fn delete_path_segments(map: &mut serde_json::Map<String, Value>, segments: &[&str]) -> bool {
    match segments {
        [] => false,
        [last] => map.remove(*last).is_some(),
        [head, rest @ ..] => {
            if let Some(Value::Object(nested)) = map.get_mut(*head) {
                delete_path_segments(nested, rest)
            } else {
                false
            }
        }
    }
}
