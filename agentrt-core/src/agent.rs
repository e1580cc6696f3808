//! Agent (C7) — the pure core (§4.2): `new`/`set`/`validate`/`cmd` operate
//! on plain data and return new values; no I/O, no background task, no
//! clock access (callers thread `now` through [`crate::strategy::StrategyContext`]).
//!
//! A value-semantic struct carrying its own execution policy as a
//! pluggable `Arc<dyn Strategy>` field rather than a fixed operator.

use crate::directive::{Directive, StateOp, deep_merge_map};
use crate::error::{AgentRuntimeError, ValidationError};
use crate::id::AgentId;
use crate::schema::Schema;
use crate::skill::{self, SkillInstance};
use crate::strategy::{Strategy, StrategyContext};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A post-processing hook run after every `cmd`, given the resulting agent
/// and the directives the strategy produced, returning the directives the
/// caller actually sees (e.g. to inject a telemetry `Emit`).
pub type AfterCmdHook = Arc<dyn Fn(&Agent, &[Directive]) -> Vec<Directive> + Send + Sync>;

/// The pure agent core: identity, state, schema, and the strategy that
/// interprets instructions against that state.
#[derive(Clone)]
pub struct Agent {
    /// This agent's instance id.
    pub id: AgentId,
    /// The agent module/type identifier (used as a [`crate::storage::CheckpointKey`] component).
    pub module: String,
    /// Current state.
    pub state: Map<String, Value>,
    /// Schema this agent's state is validated against.
    pub schema: Arc<Schema>,
    /// The execution policy `cmd` delegates to.
    pub strategy: Arc<dyn Strategy>,
    /// Whether `new`/`set` drop state keys the schema doesn't declare
    /// (only meaningful for the list-form schema).
    pub strict: bool,
    /// Optional post-processing hook run after every `cmd`.
    pub on_after_cmd: Option<AfterCmdHook>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("id", &self.id)
            .field("module", &self.module)
            .field("state", &self.state)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}

impl Agent {
    /// Build a new agent. Schema defaults are applied first, then
    /// `initial_state` is deep-merged on top, then the result is validated
    /// (and, if `strict`, stripped of undeclared keys).
    pub fn new(
        id: AgentId,
        module: impl Into<String>,
        schema: Arc<Schema>,
        strategy: Arc<dyn Strategy>,
        initial_state: Map<String, Value>,
        strict: bool,
    ) -> Result<Self, AgentRuntimeError> {
        Self::new_with_skills(id, module, schema, strategy, &[], initial_state, strict)
    }

    /// Build a new agent composed from `skills` (§3 "Skill"). Order of
    /// construction matches §4.2 `new`'s step list precisely: schema
    /// defaults first, then skill-state slices filled from skill defaults,
    /// then `initial_state` deep-merged last, then validated.
    ///
    /// Fails with [`crate::error::ConfigError::InvalidName`] if `module`
    /// doesn't match `^[A-Za-z][A-Za-z0-9_]*$`, or
    /// [`crate::error::ConfigError::DuplicateStateKey`] if two skill
    /// instances (or a skill and the agent schema) share a derived
    /// `state_key` (§6 compile-time validation).
    pub fn new_with_skills(
        id: AgentId,
        module: impl Into<String>,
        schema: Arc<Schema>,
        strategy: Arc<dyn Strategy>,
        skills: &[SkillInstance],
        initial_state: Map<String, Value>,
        strict: bool,
    ) -> Result<Self, AgentRuntimeError> {
        let module = module.into();
        skill::validate_identifier(&module)?;
        let mut state = schema.defaults();
        let schema_keys = schema.declared_keys();
        let skill_state = skill::compose_skill_state(&schema_keys, skills)?;
        for (key, value) in skill_state {
            state.insert(key, value);
        }
        deep_merge_map(&mut state, &initial_state);
        schema.validate(&mut state, strict)?;
        Ok(Self {
            id,
            module,
            state,
            schema,
            strategy,
            strict,
            on_after_cmd: None,
        })
    }

    /// Attach a post-`cmd` hook, returning the updated agent.
    pub fn with_on_after_cmd(mut self, hook: AfterCmdHook) -> Self {
        self.on_after_cmd = Some(hook);
        self
    }

    /// Re-validate the current state against the schema without mutating it.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut probe = self.state.clone();
        self.schema.validate(&mut probe, false)
    }

    /// Pure state update: deep-merge `attrs` into state, then re-validate.
    /// Returns a new agent; `self` is untouched.
    pub fn set(&self, attrs: Map<String, Value>) -> Result<Agent, AgentRuntimeError> {
        let mut state = self.state.clone();
        StateOp::SetState { attrs }.apply(&mut state);
        self.schema.validate(&mut state, self.strict)?;
        Ok(Agent {
            state,
            ..self.clone()
        })
    }

    /// Normalize `action` into instructions and delegate to the configured
    /// strategy, then run `on_after_cmd` (if any) over the resulting
    /// directives. This is the one place the pure core talks to `Strategy`.
    pub async fn cmd(
        &self,
        action: &Value,
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
        let instructions = match crate::instruction::Instruction::normalize(action) {
            Ok(instructions) => instructions,
            Err(e) => {
                // §4.2 step 1: normalize failure leaves state untouched and
                // surfaces as a single Error directive, not a hard Err.
                let directive = Directive::Error {
                    error: e.to_string(),
                    context: Some("normalize".to_string()),
                };
                let directives = match &self.on_after_cmd {
                    Some(hook) => hook(self, std::slice::from_ref(&directive)),
                    None => vec![directive],
                };
                return Ok((self.clone(), directives));
            }
        };
        let strategy = Arc::clone(&self.strategy);
        let (next, directives) = strategy.cmd(self, instructions, ctx).await?;
        let directives = match &next.on_after_cmd {
            Some(hook) => hook(&next, &directives),
            None => directives,
        };
        Ok((next, directives))
    }

    /// Run the strategy's `init` hook, e.g. to seed FSM bookkeeping.
    pub async fn init(&self, ctx: &StrategyContext) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
        let strategy = Arc::clone(&self.strategy);
        strategy.init(self, ctx).await
    }

    /// The externally-visible projection of this agent, per the configured
    /// strategy's `snapshot`.
    pub fn snapshot(&self) -> Value {
        self.strategy.snapshot(self)
    }
}
