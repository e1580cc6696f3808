#![deny(missing_docs)]
//! # agentrt — agent runtime umbrella crate
//!
//! A single import surface for the agent runtime: the pure decision core
//! (signals, instructions, directives, the agent struct itself), the
//! cooperative per-agent scheduler, and the pluggable collaborators
//! (strategies, storage backends) that plug into it. Re-exports each piece
//! behind a feature flag, plus a [`prelude`] for the happy path.
//!
//! ```text
//! Signal --> Agent::cmd (pure) --> directives --> AgentServer drain loop --> effects
//! ```
//!
//! - `agentrt-core`'s re-export (the `core` feature, pulled in by
//!   everything else) carries the protocol types: `Signal`, `Instruction`,
//!   `Directive`, `Agent`, `Strategy`, `Thread`, `Skill`.
//! - `server` (default-on) adds the cooperative scheduler
//!   (`agentrt-server`): `AgentServer`, `AgentHandle`, hibernate/thaw.
//! - `direct`/`fsm` (default-on) add the two shipped strategies.
//! - `state-memory` (default-on) / `state-fs` add storage backends.
//!
//! A product that only needs the pure core (e.g. to unit-test `cmd` without
//! pulling in `tokio`) can depend on `agentrt` with `default-features =
//! false, features = ["core"]`.

#[cfg(feature = "core")]
pub use agentrt_core;
#[cfg(feature = "core")]
pub use agentrt_registry;
#[cfg(feature = "core")]
pub use agentrt_router;
#[cfg(feature = "server")]
pub use agentrt_server;
#[cfg(feature = "state-fs")]
pub use agentrt_state_fs;
#[cfg(feature = "state-memory")]
pub use agentrt_state_memory;
#[cfg(feature = "direct")]
pub use agentrt_strategy_direct;
#[cfg(feature = "fsm")]
pub use agentrt_strategy_fsm;

/// Happy-path imports for composing an agent runtime.
pub mod prelude {
    #[cfg(feature = "core")]
    pub use agentrt_core::{
        Action, ActionContext, ActionRegistry, ActionSuccess, Agent, AgentId, AgentRuntimeError,
        ChildTag, Directive, Instruction, Schema, Signal, Skill, SkillInstance, SkillRoute, StateOp,
        Storage, Strategy, StrategyContext, Thread, ThreadId,
    };

    #[cfg(feature = "core")]
    pub use agentrt_registry::{Registration, Registry};

    #[cfg(feature = "core")]
    pub use agentrt_router::{Route, Router};

    #[cfg(feature = "server")]
    pub use agentrt_server::{
        AgentFactory, AgentHandle, AgentServer, Dispatcher, ErrorPolicy, OnParentDeath,
        RuntimeTunables, ServerContext, ServerOptions, hibernate, thaw,
    };

    #[cfg(feature = "direct")]
    pub use agentrt_strategy_direct::DirectStrategy;

    #[cfg(feature = "fsm")]
    pub use agentrt_strategy_fsm::{FsmStrategy, TransitionTable};

    #[cfg(feature = "state-memory")]
    pub use agentrt_state_memory::MemoryStore;

    #[cfg(feature = "state-fs")]
    pub use agentrt_state_fs::FsStore;
}
