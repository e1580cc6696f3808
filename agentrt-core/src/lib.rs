//! # agentrt-core — protocol types for the agentrt agent runtime
//!
//! This crate defines the pure data model and protocol boundaries that the
//! rest of the runtime (router, registry, storage backends, strategies,
//! server) is built from.
//!
//! ## The protocols
//!
//! | Component | Type | What it does |
//! |-----------|------|--------------|
//! | C1 Signal envelope | [`Signal`] | typed message carrying a routing key and payload |
//! | C2 Instruction | [`Instruction`] | normalized `(action, params, context, opts)` unit of work |
//! | C3 Directive | [`Directive`] | tagged union describing an external effect |
//! | C5 Thread | [`Thread`] | append-only interaction journal |
//! | C6 Storage | [`Storage`] | checkpoint/thread persistence interface |
//! | C7 Agent | [`Agent`] | the pure `new`/`set`/`validate`/`cmd` core |
//! | C8 Strategy | [`Strategy`] | pluggable policy translating instructions into `(agent', directives)` |
//! | §3 Skill | [`Skill`] / [`SkillInstance`] | declarative `(state slice, actions, routes, schema)` bundle composed into an `Agent` |
//!
//! ## Design principle
//!
//! [`Agent::cmd`] is referentially transparent: no I/O, no scheduler
//! interaction, no clock access. Everything effectful — dispatch, spawning,
//! scheduling, persistence — is described as data ([`Directive`]) and
//! executed by a collaborator outside this crate (see `agentrt-server`).
//!
//! ## Dependency notes
//!
//! This crate depends on `serde_json::Value` for state, params, and payload
//! fields. This is an intentional choice: JSON is the universal interchange
//! format for agent/signal systems, and `serde_json::Value` is the de facto
//! standard in the Rust ecosystem. The alternative (a generic `T: Serialize`)
//! would complicate object safety on [`Strategy`]/[`Storage`] without
//! practical benefit.

#![deny(missing_docs)]

pub mod action;
pub mod agent;
pub mod directive;
pub mod error;
pub mod id;
pub mod instruction;
pub mod schema;
pub mod signal;
pub mod skill;
pub mod storage;
pub mod strategy;
pub mod thread;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Re-exports for convenience.
pub use action::{Action, ActionContext, ActionRegistry, ActionSuccess};
pub use agent::{AfterCmdHook, Agent};
pub use directive::{Directive, ScheduledMessage, StateOp, deep_merge_map};
pub use error::{
    AgentRuntimeError, CompensationError, CompensationStatus, ConfigError, ExecutionError,
    InternalError, RoutingError, StorageError, TimeoutError, ValidationError,
};
pub use id::{AgentId, ChildTag, SignalId, ThreadId};
pub use instruction::Instruction;
pub use schema::{Field, Schema};
pub use signal::{DispatchConfig, Signal, validate_signal_type};
pub use skill::{Skill, SkillInstance, SkillRoute, collect_skill_routes, compose_skill_state, validate_identifier};
pub use storage::{Checkpoint, CheckpointKey, Storage, ThreadPointer, CHECKPOINT_VERSION};
pub use strategy::{RouteHint, Strategy, StrategyContext};
pub use thread::{Entry, NewEntry, Thread};
