//! Skill (§3 "Skill") — a declarative bundle of `(state slice, actions,
//! routes, schema)` composed into an [`crate::agent::Agent`].
//!
//! A `Skill` carries no behavior of its own here (concrete action handlers
//! are user-defined per the PURPOSE & SCOPE "out of scope" list); this
//! module only specifies the contract an agent composes skills through:
//! the declaration, the alias/derivation rules, and the collision checks
//! `Agent::new_with_skills` runs before a single byte of state exists.

use crate::error::ConfigError;
use crate::schema::Schema;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;

fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reject a name that doesn't match `^[A-Za-z][A-Za-z0-9_]*$` (§6).
pub fn validate_identifier(name: &str) -> Result<(), ConfigError> {
    if is_valid_identifier(name) {
        Ok(())
    } else {
        Err(ConfigError::InvalidName(name.to_string()))
    }
}

/// A local signal route a skill wants registered under its route prefix
/// (`<alias>.<name>` once composed — see [`SkillInstance::route_prefix`]).
#[derive(Debug, Clone)]
pub struct SkillRoute {
    /// Pattern relative to the skill's own route prefix (no prefix dot).
    pub pattern: String,
    /// The action key this route dispatches to.
    pub action: String,
    /// Priority in `[-100, 100]`, same scale as [`crate::strategy`]/router priorities.
    pub priority: i32,
}

impl SkillRoute {
    /// A route at the default priority (0).
    pub fn new(pattern: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            action: action.into(),
            priority: 0,
        }
    }

    /// Override the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

/// Declarative unit describing a composable capability: a unique `name`,
/// a unique `state_key`, the action keys it permits, its own state schema,
/// a config schema, local routes, and free-form capability tags.
#[derive(Clone)]
pub struct Skill {
    /// Unique name within the skill catalog this agent draws from.
    pub name: String,
    /// Unique key (before alias derivation) under which this skill's state
    /// slice is nested in the agent's `state`.
    pub state_key: String,
    /// Action keys this skill's instructions are permitted to invoke.
    pub actions: Vec<String>,
    /// Schema validated against this skill's own state slice (not the
    /// whole agent state). `None` imposes no constraint.
    pub schema: Option<Arc<Schema>>,
    /// Schema validated against this skill's instantiation-time config.
    pub config_schema: Option<Arc<Schema>>,
    /// Local signal routes, relative to this skill's route prefix.
    pub routes: Vec<SkillRoute>,
    /// Free-form capability tags other components can query for.
    pub capabilities: Vec<String>,
}

impl std::fmt::Debug for Skill {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Skill")
            .field("name", &self.name)
            .field("state_key", &self.state_key)
            .field("actions", &self.actions)
            .field("routes", &self.routes.len())
            .field("capabilities", &self.capabilities)
            .finish_non_exhaustive()
    }
}

impl Skill {
    /// Declare a skill. `name` must match `^[A-Za-z][A-Za-z0-9_]*$`
    /// (enforced eagerly here, not deferred to composition time, since a
    /// malformed declaration is a `ConfigError` regardless of whether it's
    /// ever composed into an agent).
    pub fn new(name: impl Into<String>, state_key: impl Into<String>) -> Result<Self, ConfigError> {
        let name = name.into();
        validate_identifier(&name)?;
        Ok(Self {
            name,
            state_key: state_key.into(),
            actions: Vec::new(),
            schema: None,
            config_schema: None,
            routes: Vec::new(),
            capabilities: Vec::new(),
        })
    }

    /// Declare the action keys this skill permits.
    pub fn with_actions(mut self, actions: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.actions = actions.into_iter().map(Into::into).collect();
        self
    }

    /// Attach a schema for this skill's own state slice.
    pub fn with_schema(mut self, schema: Arc<Schema>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Attach a schema validated against this skill's instantiation config.
    pub fn with_config_schema(mut self, schema: Arc<Schema>) -> Self {
        self.config_schema = Some(schema);
        self
    }

    /// Attach local signal routes.
    pub fn with_routes(mut self, routes: Vec<SkillRoute>) -> Self {
        self.routes = routes;
        self
    }

    /// Attach capability tags.
    pub fn with_capabilities(mut self, capabilities: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.capabilities = capabilities.into_iter().map(Into::into).collect();
        self
    }

    /// Defaults for this skill's own state slice, or an empty object if it
    /// has no schema.
    fn defaults(&self) -> Map<String, Value> {
        self.schema
            .as_ref()
            .map(|schema| schema.defaults())
            .unwrap_or_default()
    }
}

/// One instantiation of a [`Skill`] within an agent, optionally under an
/// alias (so the same skill can be mounted more than once — §3 "A skill
/// may be instantiated multiple times under distinct aliases").
#[derive(Debug, Clone)]
pub struct SkillInstance {
    /// The skill being instantiated.
    pub skill: Arc<Skill>,
    /// `None` for the skill's single default instantiation; `Some(alias)`
    /// for an additional named mount.
    pub alias: Option<String>,
    /// Instantiation-time config, validated against `skill.config_schema`
    /// if present.
    pub config: Map<String, Value>,
}

impl SkillInstance {
    /// The skill's single, unaliased instantiation.
    pub fn new(skill: Arc<Skill>) -> Self {
        Self {
            skill,
            alias: None,
            config: Map::new(),
        }
    }

    /// An additional, aliased instantiation of `skill`.
    pub fn aliased(skill: Arc<Skill>, alias: impl Into<String>) -> Self {
        Self {
            skill,
            alias: Some(alias.into()),
            config: Map::new(),
        }
    }

    /// Attach instantiation-time config.
    pub fn with_config(mut self, config: Map<String, Value>) -> Self {
        self.config = config;
        self
    }

    /// The derived `state_key` this instance's state slice is nested
    /// under: `<state_key>` unaliased, `<state_key>_<alias>` aliased.
    pub fn effective_state_key(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{}_{}", self.skill.state_key, alias),
            None => self.skill.state_key.clone(),
        }
    }

    /// The prefix this instance's local routes are namespaced under:
    /// `<name>` unaliased, `<alias>.<name>` aliased.
    pub fn route_prefix(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{alias}.{}", self.skill.name),
            None => self.skill.name.clone(),
        }
    }

    /// This instance's routes, fully qualified under [`Self::route_prefix`].
    pub fn qualified_routes(&self) -> Vec<(String, String, i32)> {
        let prefix = self.route_prefix();
        self.skill
            .routes
            .iter()
            .map(|route| (format!("{prefix}.{}", route.pattern), route.action.clone(), route.priority))
            .collect()
    }

    /// Validate `self.config` against the skill's `config_schema`, if any.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        if let Some(schema) = &self.skill.config_schema {
            let mut probe = self.config.clone();
            schema
                .validate(&mut probe, false)
                .map_err(|e| ConfigError::Other(Box::new(e)))?;
        }
        Ok(())
    }
}

/// Check every instance's derived `state_key` is unique among themselves
/// and doesn't collide with `agent_schema_keys`, then build the composed
/// state-key → default-state-slice map (§4.2 `Agent::new` step 2: "skill-
/// state slices filled from skill defaults").
///
/// Invariant enforced here (§3 Skill invariants): all `state_key`s
/// (including derived) must be unique within an agent, and must not
/// collide with agent-level schema keys.
pub fn compose_skill_state(
    agent_schema_keys: &HashSet<String>,
    skills: &[SkillInstance],
) -> Result<Map<String, Value>, ConfigError> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut composed = Map::new();
    for instance in skills {
        instance.validate_config()?;
        let key = instance.effective_state_key();
        if agent_schema_keys.contains(&key) || !seen.insert(key.clone()) {
            return Err(ConfigError::DuplicateStateKey(key));
        }
        composed.insert(key, Value::Object(instance.skill.defaults()));
    }
    Ok(composed)
}

/// Collect every instance's routes, fully qualified under its route
/// prefix, in instance order. Intended to seed an `agentrt-router` router
/// with `(pattern, action_key, priority)` triples a caller turns into
/// handler registrations.
pub fn collect_skill_routes(skills: &[SkillInstance]) -> Vec<(String, String, i32)> {
    skills.iter().flat_map(SkillInstance::qualified_routes).collect()
}
