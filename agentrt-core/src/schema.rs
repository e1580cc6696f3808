//! A single internal schema abstraction with two constructors, per the
//! §9 design note: "one internal schema abstraction with two constructors
//! (list-form and structural form); both compile to the same predicate
//! graph." Both flavors are stored behind the same enum so
//! [`crate::agent::Agent::validate`] doesn't need to know which it holds.

use crate::error::ValidationError;
use serde_json::{Map, Value};
use std::sync::Arc;

/// A field declaration for the list-form schema constructor.
#[derive(Debug, Clone)]
pub struct Field {
    /// The field's key within `state`.
    pub name: String,
    /// Whether the field must be present.
    pub required: bool,
    /// The default value used by `Agent::new` when the field is absent.
    pub default: Option<Value>,
}

impl Field {
    /// A required field with no default.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            default: None,
        }
    }

    /// An optional field with a default value.
    pub fn optional(name: impl Into<String>, default: Value) -> Self {
        Self {
            name: name.into(),
            required: false,
            default: Some(default),
        }
    }
}

type Predicate = Arc<dyn Fn(&Value) -> Result<(), ValidationError> + Send + Sync>;

/// A compiled validation rule over agent state.
#[derive(Clone)]
pub enum Schema {
    /// List-form: a flat list of field declarations.
    Fields(Vec<Field>),
    /// Structural form: an arbitrary predicate over the whole state value.
    Predicate(Predicate),
}

impl std::fmt::Debug for Schema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Schema::Fields(fields) => f.debug_tuple("Schema::Fields").field(fields).finish(),
            Schema::Predicate(_) => f.write_str("Schema::Predicate(..)"),
        }
    }
}

impl Schema {
    /// List-form constructor: validate by an explicit list of fields.
    pub fn fields(fields: Vec<Field>) -> Self {
        Schema::Fields(fields)
    }

    /// Structural-form constructor: validate with an arbitrary predicate.
    pub fn from_predicate(
        predicate: impl Fn(&Value) -> Result<(), ValidationError> + Send + Sync + 'static,
    ) -> Self {
        Schema::Predicate(Arc::new(predicate))
    }

    /// An empty schema that imposes no constraints and has no defaults.
    pub fn none() -> Self {
        Schema::Fields(Vec::new())
    }

    /// Schema-declared default values, merged last (after any user-provided
    /// state) during `Agent::new`. Only meaningful for the list form.
    pub fn defaults(&self) -> Map<String, Value> {
        match self {
            Schema::Fields(fields) => fields
                .iter()
                .filter_map(|f| f.default.clone().map(|d| (f.name.clone(), d)))
                .collect(),
            Schema::Predicate(_) => Map::new(),
        }
    }

    /// Field names this schema declares, for collision checks against
    /// skill-derived state keys (§3 Skill invariants). The structural form
    /// can't be introspected this way and reports no declared keys.
    pub fn declared_keys(&self) -> std::collections::HashSet<String> {
        match self {
            Schema::Fields(fields) => fields.iter().map(|f| f.name.clone()).collect(),
            Schema::Predicate(_) => std::collections::HashSet::new(),
        }
    }

    /// Validate `state` against this schema. `strict` drops (for the list
    /// form) any key not declared in the schema.
    pub fn validate(&self, state: &mut Map<String, Value>, strict: bool) -> Result<(), ValidationError> {
        match self {
            Schema::Fields(fields) => {
                for field in fields {
                    if field.required && !state.contains_key(&field.name) {
                        return Err(ValidationError::SchemaViolation(format!(
                            "missing required field {:?}",
                            field.name
                        )));
                    }
                }
                if strict {
                    let allowed: std::collections::HashSet<&str> =
                        fields.iter().map(|f| f.name.as_str()).collect();
                    state.retain(|k, _| allowed.contains(k.as_str()));
                }
                Ok(())
            }
            Schema::Predicate(predicate) => predicate(&Value::Object(state.clone())),
        }
    }
}
