#![deny(missing_docs)]
//! Per-agent cooperative scheduler, directive interpreter, and hibernate/
//! thaw persistence façade for the `agentrt` agent runtime (spec §4.5,
//! §4.6, §4.8).
//!
//! This crate is the only piece of the runtime that touches `tokio`: the
//! pure core (`agentrt-core`) never schedules anything or performs I/O, and
//! this crate is where signals actually get dispatched, directives actually
//! get interpreted, and agents actually get hibernated to a [`Storage`]
//! backend.
//!
//! - [`server`] — the per-agent task: mailbox intake, the drain loop,
//!   backpressure, parent/child hierarchy.
//! - [`interpreter`] — maps each [`agentrt_core::Directive`] variant to a
//!   runtime effect.
//! - [`options`] — server startup options and process-wide tunables.
//! - [`persist`] — hibernate/thaw.
//!
//! [`Storage`]: agentrt_core::Storage

pub mod interpreter;
pub mod options;
pub mod persist;
pub mod server;

pub use interpreter::{AgentFactory, Castable, Dispatcher, NoopDispatcher, RouterDispatcher};
pub use options::{ErrorPolicy, OnParentDeath, RuntimeTunables, ServerOptions};
pub use persist::{hibernate, thaw};
pub use server::{
    AgentHandle, AgentServer, LifecycleStatus, ServerContext, ServerSnapshot, SignalHandler,
    is_alive, whereis,
};
