//! Instruction (C2) — the normalized unit of work.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque handler reference. The runtime treats this as a key only; it
/// never inspects or dispatches on its internal shape.
pub type Action = String;

/// `(action, params, context, opts)` — the normalized unit of work a
/// [`crate::strategy::Strategy`] executes.
///
/// Invariant: `params` is always a mapping, never `Value::Null` or a scalar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instruction {
    /// The action key to invoke.
    pub action: Action,
    /// Parameters passed to the action. Always an object.
    #[serde(default = "empty_map")]
    pub params: Map<String, Value>,
    /// Caller-provided context, merged with the agent's state at call time.
    #[serde(default = "empty_map")]
    pub context: Map<String, Value>,
    /// Per-instruction options (journalling, compensation, etc).
    #[serde(default = "empty_map")]
    pub opts: Map<String, Value>,
}

fn empty_map() -> Map<String, Value> {
    Map::new()
}

impl Instruction {
    /// Build an instruction with empty params/context/opts.
    pub fn bare(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            params: Map::new(),
            context: Map::new(),
            opts: Map::new(),
        }
    }

    /// Build an instruction with params, empty context/opts.
    pub fn with_params(action: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            action: action.into(),
            params,
            context: Map::new(),
            opts: Map::new(),
        }
    }

    /// Merge extra context on top of this instruction's own context.
    /// Caller-provided keys win ties (already-present keys are left alone).
    pub fn merge_context(&mut self, caller_context: &Map<String, Value>) {
        for (k, v) in caller_context {
            self.context.entry(k.clone()).or_insert_with(|| v.clone());
        }
    }

    /// Normalize one of the three accepted `action` shapes into a list of
    /// instructions (§4.2 step 1 / §3 Instruction normalization rules):
    /// a bare action string, an `(action, params)` pair encoded as a
    /// 2-element JSON array, or a pre-built [`Instruction`]/array of them.
    /// A `Value::Array` whose elements are themselves arrays is rejected —
    /// nested instruction lists are not allowed.
    pub fn normalize(action: &Value) -> Result<Vec<Instruction>, ValidationError> {
        match action {
            Value::String(s) => Ok(vec![Instruction::bare(s.clone())]),
            Value::Array(items) => {
                // A 2-element [action_string, params_object] pair is a
                // single instruction, not a list of two.
                if items.len() == 2 {
                    if let (Value::String(name), Value::Object(params)) = (&items[0], &items[1]) {
                        return Ok(vec![Instruction::with_params(name.clone(), params.clone())]);
                    }
                }
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    if item.is_array() {
                        return Err(ValidationError::NestedInstructionList);
                    }
                    out.extend(Instruction::normalize(item)?);
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let instruction: Instruction = serde_json::from_value(Value::Object(obj.clone()))
                    .map_err(|e| {
                        ValidationError::NotAMapping {
                            field: "action".to_string(),
                            got: e.to_string(),
                        }
                    })?;
                Ok(vec![instruction])
            }
            other => Err(ValidationError::NotAMapping {
                field: "action".to_string(),
                got: other.to_string(),
            }),
        }
    }
}
