//! Agent server (C10) — the cooperative per-agent scheduler: one `tokio`
//! task per agent, fed by a mailbox, running the pure [`Agent`] core and
//! interpreting the directives it returns.
//!
//! A pop-from-a-work-queue, dispatch, interpret-effects, extend-the-queue
//! loop bounded by a safety limit, generalized from a depth-first one-shot
//! runner into a long-lived actor: intake (the mailbox) and the work queue
//! are two separate things. A signal's `cmd` call produces zero or more
//! `(signal, directive)` pairs, appended to a queue bounded by
//! `max_queue_size`; a self-addressed `Drain` message pops and interprets
//! one pair at a time, re-sending itself while the queue is non-empty. An
//! enqueue that would push the queue past `max_queue_size` drops the whole
//! incoming batch — the signal's own state change already committed stays
//! committed; none of its directives run.

use crate::interpreter::{AgentFactory, Castable, Dispatcher, NoopDispatcher};
use crate::options::{ErrorPolicy, OnParentDeath, ServerOptions};
use agentrt_core::{
    Action, ActionRegistry, Agent, AgentId, AgentRuntimeError, ChildTag, Directive, InternalError,
    ScheduledMessage, Signal, StrategyContext, TimeoutError,
};
use agentrt_registry::{Registration, Registry};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// The lifecycle an agent server moves through: `Initializing` while its
/// `Strategy::init` hook runs, `Idle`/`Processing` alternating with mailbox
/// activity, `Stopping` once a `Stop` directive (or an external `stop`) is
/// accepted, `Dead` once the task has exited and deregistered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStatus {
    /// Running `Strategy::init` before accepting any signal.
    Initializing,
    /// Waiting for the next mailbox item.
    Idle,
    /// Running `handle_signal`/`cmd` for the item currently dequeued.
    Processing,
    /// A stop has been accepted; draining in-flight work only.
    Stopping,
    /// The task has exited; the id is no longer registered.
    Dead,
}

/// A point-in-time view of a running agent server, returned by
/// [`AgentHandle::snapshot`].
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Lifecycle state at the moment this snapshot was taken.
    pub status: LifecycleStatus,
    /// `(signal, directive)` pairs waiting on the drain step.
    pub queue_len: usize,
    /// The agent's externally-visible projection (`Strategy::snapshot`).
    pub view: Value,
    /// Tags of currently-tracked children.
    pub children: Vec<ChildTag>,
}

/// Override for how a signal becomes an `Agent::cmd` call. Default
/// (`None` in [`AgentServer::start`]) maps a signal's `type`/`data` to a
/// bare or `(action, params)` instruction per §4.5; implement this only to
/// bypass that mapping entirely (e.g. a custom wire protocol).
#[async_trait]
pub trait SignalHandler: Send + Sync {
    /// Produce the next agent and directives for `signal`.
    async fn handle_signal(
        &self,
        agent: &Agent,
        signal: &Signal,
        ctx: &StrategyContext,
    ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError>;
}

/// Collaborators shared by every agent server in a runtime: the action
/// lookup strategies resolve instructions through, how `Emit` directives
/// leave the process, how `Spawn` directives build children, and the
/// registry every server id is tracked in.
#[derive(Clone)]
pub struct ServerContext {
    /// Resolves instruction `action` keys for `Strategy::cmd`.
    pub actions: Arc<ActionRegistry>,
    /// Routes `Emit` directives. Defaults to [`NoopDispatcher`] (log and
    /// drop) when not overridden.
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Builds child agents for `Spawn` directives. `None` means `Spawn` is
    /// rejected with a logged, dropped directive (no factory configured).
    pub factory: Option<Arc<dyn AgentFactory>>,
    /// Process-wide id → handle registry.
    pub registry: Registry<AgentHandle>,
}

impl ServerContext {
    /// Build a context with no dispatcher or factory configured.
    pub fn new(actions: Arc<ActionRegistry>, registry: Registry<AgentHandle>) -> Self {
        Self {
            actions,
            dispatcher: Arc::new(NoopDispatcher),
            factory: None,
            registry,
        }
    }

    /// Attach a dispatcher for `Emit` directives.
    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Attach a factory for `Spawn` directives.
    pub fn with_factory(mut self, factory: Arc<dyn AgentFactory>) -> Self {
        self.factory = Some(factory);
        self
    }
}

enum Envelope {
    Signal {
        signal: Signal,
        respond_to: Option<oneshot::Sender<Result<Value, AgentRuntimeError>>>,
    },
    /// Self-addressed: pop and interpret one `(signal, directive)` pair off
    /// the front of the queue, re-sending itself while the queue remains
    /// non-empty.
    Drain,
    Query(oneshot::Sender<ServerSnapshot>),
    RegisterChild {
        tag: ChildTag,
        handle: AgentHandle,
        ack: oneshot::Sender<()>,
    },
    ChildExit {
        tag: ChildTag,
        child_id: AgentId,
        reason: String,
    },
    ParentExit {
        reason: String,
    },
    StopRequest {
        reason: String,
        ack: oneshot::Sender<()>,
    },
}

/// A cloneable reference to a running agent server's mailbox.
///
/// Cheap to clone; every clone shares the same mailbox and liveness flag.
/// Dropping every clone (and the task's own copy) closes the mailbox, which
/// the server interprets as a normal — if unannounced — completion.
#[derive(Clone)]
pub struct AgentHandle {
    id: AgentId,
    tx: mpsc::UnboundedSender<Envelope>,
    alive: Arc<AtomicBool>,
}

fn dead_err(id: &AgentId) -> AgentRuntimeError {
    AgentRuntimeError::Internal(InternalError::InvariantViolated(format!(
        "agent {id} is not running"
    )))
}

impl AgentHandle {
    /// This agent's id.
    pub fn id(&self) -> &AgentId {
        &self.id
    }

    /// Whether the server task is still running.
    pub fn alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Deliver `signal` without waiting for a reply. The mailbox itself
    /// never applies backpressure (§4.5/§6) — `max_queue_size` instead
    /// bounds the `(signal, directive)` queue the signal's directives land
    /// in once `cmd` runs; overflow there drops that signal's directives
    /// and is reported via the `agent_server.queue.overflow` telemetry
    /// event, not as an error from `cast`.
    pub async fn cast(&self, signal: Signal) -> Result<(), AgentRuntimeError> {
        self.tx
            .send(Envelope::Signal { signal, respond_to: None })
            .map_err(|_| dead_err(&self.id))
    }

    /// Deliver `signal` and await the resulting agent view, or
    /// [`agentrt_core::TimeoutError::CallTimedOut`] after `timeout_ms`.
    pub async fn call(&self, signal: Signal, timeout_ms: u64) -> Result<Value, AgentRuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Envelope::Signal {
                signal,
                respond_to: Some(tx),
            })
            .map_err(|_| dead_err(&self.id))?;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(dead_err(&self.id)),
            Err(_) => Err(AgentRuntimeError::Timeout(TimeoutError::CallTimedOut {
                target: self.id.to_string(),
                timeout_ms,
            })),
        }
    }

    /// The agent's current externally-visible view (`Strategy::snapshot`).
    pub async fn state(&self) -> Result<Value, AgentRuntimeError> {
        Ok(self.snapshot().await?.view)
    }

    /// A full point-in-time snapshot (status, queue depth, view, children).
    pub async fn snapshot(&self) -> Result<ServerSnapshot, AgentRuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(Envelope::Query(tx)).map_err(|_| dead_err(&self.id))?;
        rx.await.map_err(|_| dead_err(&self.id))
    }

    /// Request the server stop with `reason`, awaiting acknowledgement that
    /// it has drained and exited.
    pub async fn stop(&self, reason: impl Into<String>) -> Result<(), AgentRuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(Envelope::StopRequest {
                reason: reason.into(),
                ack: tx,
            })
            .map_err(|_| dead_err(&self.id))?;
        let _ = rx.await;
        Ok(())
    }
}

#[async_trait]
impl Castable for AgentHandle {
    async fn cast(&self, signal: Signal) -> Result<(), AgentRuntimeError> {
        AgentHandle::cast(self, signal).await
    }
}

/// Look up a live handle by id, or `None` if it was never registered or has
/// since deregistered.
pub fn whereis(registry: &Registry<AgentHandle>, id: &AgentId) -> Option<AgentHandle> {
    registry.lookup(id)
}

/// Whether `id` currently names a live, registered agent server.
pub fn is_alive(registry: &Registry<AgentHandle>, id: &AgentId) -> bool {
    registry.lookup(id).map(|h| h.alive()).unwrap_or(false)
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Map a signal to the `action` value `Agent::cmd` normalizes, per §4.5:
/// a pre-built `jido_instructions` list bypasses this mapping entirely;
/// otherwise `data` (if an object) becomes `(type, data)`, else `type`
/// alone is used as a bare action.
fn signal_to_action(signal: &Signal) -> Value {
    if let Some(instructions) = &signal.instructions {
        return serde_json::to_value(instructions).expect("instructions always serialize");
    }
    match &signal.data {
        Value::Object(params) => Value::Array(vec![
            Value::String(signal.kind.clone()),
            Value::Object(params.clone()),
        ]),
        _ => Value::String(signal.kind.clone()),
    }
}

/// The per-agent scheduler. Stateless by design — every method either
/// spawns a task ([`AgentServer::start`]/[`AgentServer::start_link`]) or is
/// a free function operating on a [`Registry`] ([`whereis`]/[`is_alive`]).
pub struct AgentServer;

impl AgentServer {
    fn spawn_internal(
        agent: Agent,
        options: ServerOptions,
        ctx: ServerContext,
        handler: Option<Arc<dyn SignalHandler>>,
        parent_notify: Option<(AgentHandle, ChildTag)>,
    ) -> Result<(AgentHandle, tokio::task::JoinHandle<()>), AgentRuntimeError> {
        options.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let alive = Arc::new(AtomicBool::new(true));
        let handle = AgentHandle {
            id: agent.id.clone(),
            tx,
            alive: alive.clone(),
        };
        let registration = ctx
            .registry
            .register(agent.id.clone(), handle.clone())
            .map_err(AgentRuntimeError::Config)?;
        let self_handle = handle.clone();
        let join = tokio::spawn(run(
            agent,
            options,
            ctx,
            rx,
            alive,
            handler,
            registration,
            self_handle,
            parent_notify,
        ));
        Ok((handle, join))
    }

    /// Start a standalone agent server with no parent.
    pub fn start(
        agent: Agent,
        options: ServerOptions,
        ctx: ServerContext,
        handler: Option<Arc<dyn SignalHandler>>,
    ) -> Result<(AgentHandle, tokio::task::JoinHandle<()>), AgentRuntimeError> {
        Self::spawn_internal(agent, options, ctx, handler, None)
    }

    /// Start an agent server and register it as `parent`'s child under
    /// `tag`. The child notifies `parent` with a `jido.child_exit` signal
    /// when it stops, for any reason.
    pub async fn start_link(
        parent: &AgentHandle,
        agent: Agent,
        options: ServerOptions,
        ctx: ServerContext,
        handler: Option<Arc<dyn SignalHandler>>,
        tag: ChildTag,
    ) -> Result<AgentHandle, AgentRuntimeError> {
        let (handle, _join) = Self::spawn_internal(agent, options, ctx, handler, Some((parent.clone(), tag.clone())))?;
        let (ack_tx, ack_rx) = oneshot::channel();
        parent
            .tx
            .send(Envelope::RegisterChild {
                tag,
                handle: handle.clone(),
                ack: ack_tx,
            })
            .map_err(|_| dead_err(&parent.id))?;
        ack_rx.await.map_err(|_| dead_err(&parent.id))?;
        Ok(handle)
    }
}

async fn run_handler(
    agent: Agent,
    signal: Signal,
    ctx: StrategyContext,
    handler: Option<Arc<dyn SignalHandler>>,
) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
    let task = tokio::spawn(async move {
        match handler {
            Some(h) => h.handle_signal(&agent, &signal, &ctx).await,
            None => agent.cmd(&signal_to_action(&signal), &ctx).await,
        }
    });
    match task.await {
        Ok(result) => result,
        Err(join_err) => Err(AgentRuntimeError::Internal(InternalError::HandlerPanicked(
            join_err.to_string(),
        ))),
    }
}

/// Interpret a single directive popped off the drain queue. Returns
/// `Some(reason)` if it was a `Stop` (or an `Error` escalated by
/// `error_policy`).
async fn interpret_one(
    agent_id: &AgentId,
    self_handle: &AgentHandle,
    directive: Directive,
    ctx: &ServerContext,
    error_policy: ErrorPolicy,
    default_dispatch: &Option<agentrt_core::DispatchConfig>,
    children: &mut HashMap<ChildTag, AgentHandle>,
) -> Option<String> {
    match directive {
        Directive::Emit { signal, dispatch } => {
            // §4.6: resolve as `directive.dispatch ?? server.default_dispatch`;
            // nil resolves to log-and-drop without ever reaching the
            // Dispatcher collaborator, otherwise hand off with the resolved
            // config.
            match dispatch.or_else(|| default_dispatch.clone()) {
                Some(resolved) => {
                    tracing::debug!(agent_id = %agent_id, signal_type = %signal.kind, "agent_server.directive.start");
                    ctx.dispatcher.dispatch(signal, Some(resolved)).await;
                    tracing::debug!(agent_id = %agent_id, "agent_server.directive.stop");
                }
                None => {
                    tracing::debug!(
                        agent_id = %agent_id,
                        signal_type = %signal.kind,
                        "agent_server.dispatch.unconfigured_drop"
                    );
                }
            }
            None
        }
        Directive::Error { error, context } => {
            tracing::warn!(
                agent_id = %agent_id,
                error = %error,
                context = context.as_deref().unwrap_or(""),
                "agent_server.directive.exception"
            );
            if error_policy == ErrorPolicy::StopOnError {
                Some(error)
            } else {
                None
            }
        }
        Directive::Spawn { child_spec, tag } => {
            let Some(factory) = &ctx.factory else {
                tracing::warn!(
                    agent_id = %agent_id,
                    "agent_server.directive.exception: Spawn with no AgentFactory configured"
                );
                return None;
            };
            match factory.build(child_spec, agent_id).await {
                Ok(child_agent) => {
                    let child_tag = tag.unwrap_or_else(|| ChildTag::new(child_agent.id.to_string()));
                    let options = ServerOptions::default();
                    match AgentServer::spawn_internal(
                        child_agent,
                        options,
                        ctx.clone(),
                        None,
                        Some((self_handle.clone(), child_tag.clone())),
                    ) {
                        Ok((child_handle, _join)) => {
                            children.insert(child_tag, child_handle);
                        }
                        Err(e) => tracing::warn!(agent_id = %agent_id, error = %e, "agent_server.directive.exception"),
                    }
                }
                Err(e) => tracing::warn!(agent_id = %agent_id, error = %e, "agent_server.directive.exception"),
            }
            None
        }
        Directive::Schedule { delay_ms, message } => {
            let handle = self_handle.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                let signal = match message {
                    ScheduledMessage::Signal(signal) => signal,
                    ScheduledMessage::Payload(payload) => {
                        Signal::new("agent_server", "jido.scheduled").with_data(payload)
                    }
                };
                let _ = handle.cast(signal).await;
            });
            None
        }
        Directive::Stop { reason } => Some(reason),
    }
}

/// Append `directives` to the drain queue, each paired with the signal that
/// produced it, unless doing so would push the queue past `max_queue_size`
/// — in which case the whole batch is dropped and `agent_server.queue.
/// overflow` is logged. The signal's own state change (already applied to
/// `agent` by the caller) is unaffected either way (§4.5/§8 property 3).
fn enqueue(
    queue: &mut VecDeque<(Signal, Directive)>,
    max_queue_size: usize,
    agent_id: &AgentId,
    signal: &Signal,
    directives: Vec<Directive>,
) {
    if directives.is_empty() {
        return;
    }
    if queue.len() + directives.len() > max_queue_size {
        tracing::debug!(
            agent_id = %agent_id,
            signal_id = %signal.id,
            signal_type = %signal.kind,
            queue_len = queue.len(),
            incoming = directives.len(),
            max_queue_size,
            "agent_server.queue.overflow"
        );
        return;
    }
    for directive in directives {
        queue.push_back((signal.clone(), directive));
    }
}

/// Kick off the drain loop with a self-addressed [`Envelope::Drain`] if the
/// queue is non-empty and nothing is draining it yet.
fn start_drain_if_needed(self_handle: &AgentHandle, queue: &VecDeque<(Signal, Directive)>, draining: &mut bool) {
    if !*draining && !queue.is_empty() {
        *draining = true;
        let _ = self_handle.tx.send(Envelope::Drain);
    }
}

async fn notify_children_of_exit(children: &HashMap<ChildTag, AgentHandle>, reason: &str) {
    for child in children.values() {
        let _ = child
            .tx
            .send(Envelope::ParentExit {
                reason: reason.to_string(),
            });
    }
}

#[allow(clippy::too_many_arguments)]
async fn run(
    mut agent: Agent,
    options: ServerOptions,
    ctx: ServerContext,
    mut rx: mpsc::UnboundedReceiver<Envelope>,
    alive: Arc<AtomicBool>,
    handler: Option<Arc<dyn SignalHandler>>,
    _registration: Registration<AgentHandle>,
    self_handle: AgentHandle,
    parent_notify: Option<(AgentHandle, ChildTag)>,
) {
    tracing::debug!(agent_id = %agent.id, "agent_server.lifecycle.initializing");
    let init_ctx = StrategyContext::new(ctx.actions.clone(), now_ms());
    let mut queue: VecDeque<(Signal, Directive)> = VecDeque::new();
    let mut draining = false;
    let mut children: HashMap<ChildTag, AgentHandle> = HashMap::new();
    let mut final_reason = "normal".to_string();

    match agent.init(&init_ctx).await {
        Ok((next, directives)) => {
            agent = next;
            let init_signal = Signal::new("agent_server", "jido.init");
            enqueue(&mut queue, options.max_queue_size, &agent.id, &init_signal, directives);
        }
        Err(e) => {
            tracing::warn!(agent_id = %agent.id, error = %e, "agent_server.lifecycle.init_failed");
        }
    }
    start_drain_if_needed(&self_handle, &queue, &mut draining);

    'mailbox: while let Some(envelope) = rx.recv().await {
        match envelope {
            Envelope::Signal { signal, respond_to } => {
                tracing::debug!(agent_id = %agent.id, signal_type = %signal.kind, "agent_server.signal.start");
                let now = now_ms();
                let strategy_ctx = StrategyContext::new(ctx.actions.clone(), now);
                let outcome = run_handler(agent.clone(), signal.clone(), strategy_ctx, handler.clone()).await;

                match outcome {
                    Ok((next_agent, directives)) => {
                        agent = next_agent;
                        let view = agent.snapshot();
                        enqueue(&mut queue, options.max_queue_size, &agent.id, &signal, directives);
                        tracing::debug!(agent_id = %agent.id, signal_type = %signal.kind, "agent_server.signal.stop");
                        if let Some(tx) = respond_to {
                            let _ = tx.send(Ok(view));
                        }
                    }
                    Err(e) => {
                        tracing::debug!(
                            agent_id = %agent.id,
                            signal_type = %signal.kind,
                            error = %e,
                            "agent_server.signal.exception"
                        );
                        if let Some(tx) = respond_to {
                            let _ = tx.send(Err(e));
                        }
                    }
                }
                start_drain_if_needed(&self_handle, &queue, &mut draining);
            }
            Envelope::Drain => {
                if let Some((_signal, directive)) = queue.pop_front() {
                    if let Some(reason) =
                        interpret_one(
                            &agent.id,
                            &self_handle,
                            directive,
                            &ctx,
                            options.error_policy,
                            &options.default_dispatch,
                            &mut children,
                        )
                        .await
                    {
                        final_reason = reason;
                        break 'mailbox;
                    }
                }
                if queue.is_empty() {
                    draining = false;
                } else {
                    let _ = self_handle.tx.send(Envelope::Drain);
                }
            }
            Envelope::Query(respond_to) => {
                let _ = respond_to.send(ServerSnapshot {
                    status: if draining {
                        LifecycleStatus::Processing
                    } else {
                        LifecycleStatus::Idle
                    },
                    queue_len: queue.len(),
                    view: agent.snapshot(),
                    children: children.keys().cloned().collect(),
                });
            }
            Envelope::RegisterChild { tag, handle, ack } => {
                children.insert(tag, handle);
                let _ = ack.send(());
            }
            Envelope::ChildExit { tag, child_id, reason } => {
                children.remove(&tag);
                let synthetic = Signal::new("agent_server", "jido.child_exit").with_data(serde_json::json!({
                    "tag": tag.as_str(),
                    "child_id": child_id.as_str(),
                    "reason": reason,
                }));
                let now = now_ms();
                let strategy_ctx = StrategyContext::new(ctx.actions.clone(), now);
                if let Ok((next, directives)) = agent.cmd(&signal_to_action(&synthetic), &strategy_ctx).await {
                    agent = next;
                    enqueue(&mut queue, options.max_queue_size, &agent.id, &synthetic, directives);
                }
                start_drain_if_needed(&self_handle, &queue, &mut draining);
            }
            Envelope::ParentExit { reason } => match options.on_parent_death {
                OnParentDeath::StopSelf => {
                    final_reason = "orphaned".to_string();
                    tracing::debug!(agent_id = %agent.id, %reason, "agent_server.lifecycle.orphaned_stop");
                    break 'mailbox;
                }
                OnParentDeath::Continue => {
                    tracing::debug!(agent_id = %agent.id, %reason, "agent_server.lifecycle.parent_exit_continue");
                }
                OnParentDeath::Orphan => {
                    let synthetic =
                        Signal::new("agent_server", "jido.orphaned").with_data(serde_json::json!({ "reason": reason }));
                    let now = now_ms();
                    let strategy_ctx = StrategyContext::new(ctx.actions.clone(), now);
                    if let Ok((next, directives)) = agent.cmd(&signal_to_action(&synthetic), &strategy_ctx).await {
                        agent = next;
                        enqueue(&mut queue, options.max_queue_size, &agent.id, &synthetic, directives);
                    }
                    start_drain_if_needed(&self_handle, &queue, &mut draining);
                }
            },
            Envelope::StopRequest { reason, ack } => {
                final_reason = reason;
                let _ = ack.send(());
                break 'mailbox;
            }
        }
    }

    if matches!(
        final_reason.as_str(),
        "normal" | "completed" | "ok" | "done" | "success"
    ) {
        tracing::warn!(
            agent_id = %agent.id,
            reason = %final_reason,
            "agent_server.lifecycle.stop_normal_completion: use state status, not Stop, for normal completion"
        );
    }
    notify_children_of_exit(&children, "parent stopped").await;
    alive.store(false, Ordering::SeqCst);
    tracing::debug!(agent_id = %agent.id, reason = %final_reason, "agent_server.lifecycle.dead");
    if let Some((parent_handle, tag)) = parent_notify {
        let _ = parent_handle.tx.send(Envelope::ChildExit {
            tag,
            child_id: agent.id.clone(),
            reason: final_reason,
        });
    }
}

/// Prevent the unused-import warning if no default action registry callers
/// exist in a given build configuration (kept for symmetry with
/// `ServerContext::actions`'s type).
#[allow(dead_code)]
fn _touch(_a: Arc<dyn Action>) {}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrt_core::test_utils::{test_agent, CountingStrategy};
    use serde_json::json;

    fn ctx() -> ServerContext {
        ServerContext::new(Arc::new(ActionRegistry::new()), Registry::new())
    }

    #[tokio::test]
    async fn call_runs_cmd_and_returns_updated_view() {
        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let (handle, _join) = AgentServer::start(agent, ServerOptions::default(), ctx(), None).unwrap();
        let view = handle
            .call(Signal::new("test", "increment"), 1_000)
            .await
            .unwrap();
        assert_eq!(view["last_action"], json!("increment"));
        handle.stop("done").await.unwrap();
    }

    #[tokio::test]
    async fn queue_overflow_drops_directives_but_keeps_the_state_change() {
        use agentrt_core::DispatchConfig;
        use std::sync::atomic::AtomicUsize;

        struct ThreeEmits;
        #[async_trait]
        impl SignalHandler for ThreeEmits {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                let next = agent.set({
                    let mut m = serde_json::Map::new();
                    m.insert("touched".to_string(), json!(true));
                    m
                })?;
                let directives = (0..3)
                    .map(|i| Directive::Emit {
                        signal: Signal::new("test", format!("emit.{i}")),
                        dispatch: None,
                    })
                    .collect();
                Ok((next, directives))
            }
        }

        struct CountingDispatcher(Arc<AtomicUsize>);
        #[async_trait]
        impl Dispatcher for CountingDispatcher {
            async fn dispatch(&self, _signal: Signal, _dispatch: Option<DispatchConfig>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), Registry::new())
            .with_dispatcher(Arc::new(CountingDispatcher(counter.clone())));
        let options = ServerOptions::default().with_max_queue_size(2);
        let (handle, _join) = AgentServer::start(agent, options, ctx, Some(Arc::new(ThreeEmits))).unwrap();

        // The signal's own state change commits even though its 3 directives
        // overflow a queue bounded to 2.
        let view = handle.call(Signal::new("test", "tick"), 1_000).await.unwrap();
        assert_eq!(view["touched"], json!(true));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0, "all 3 directives should have been dropped");
        handle.stop("done").await.unwrap();
    }

    #[tokio::test]
    async fn directives_within_the_bound_all_drain() {
        use agentrt_core::DispatchConfig;
        use std::sync::atomic::AtomicUsize;

        struct TwoEmits;
        #[async_trait]
        impl SignalHandler for TwoEmits {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                let directives = (0..2)
                    .map(|i| Directive::Emit {
                        signal: Signal::new("test", format!("emit.{i}")),
                        dispatch: None,
                    })
                    .collect();
                Ok((agent.clone(), directives))
            }
        }

        struct CountingDispatcher(Arc<AtomicUsize>);
        #[async_trait]
        impl Dispatcher for CountingDispatcher {
            async fn dispatch(&self, _signal: Signal, _dispatch: Option<DispatchConfig>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let counter = Arc::new(AtomicUsize::new(0));
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), Registry::new())
            .with_dispatcher(Arc::new(CountingDispatcher(counter.clone())));
        let options = ServerOptions::default().with_max_queue_size(2);
        let (handle, _join) = AgentServer::start(agent, options, ctx, Some(Arc::new(TwoEmits))).unwrap();

        handle.cast(Signal::new("test", "tick")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        handle.stop("done").await.unwrap();
    }

    #[tokio::test]
    async fn whereis_and_is_alive_reflect_registry_state() {
        let registry: Registry<AgentHandle> = Registry::new();
        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let id = agent.id.clone();
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), registry.clone());
        let (handle, _join) = AgentServer::start(agent, ServerOptions::default(), ctx, None).unwrap();

        assert!(is_alive(&registry, &id));
        assert!(whereis(&registry, &id).is_some());
        handle.stop("done").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!is_alive(&registry, &id));
    }

    #[tokio::test]
    async fn stop_directive_ends_the_mailbox_loop() {
        struct StopOnCommand;
        #[async_trait]
        impl SignalHandler for StopOnCommand {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                Ok((
                    agent.clone(),
                    vec![Directive::Stop {
                        reason: "completed".to_string(),
                    }],
                ))
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let id = agent.id.clone();
        let registry: Registry<AgentHandle> = Registry::new();
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), registry.clone());
        let (handle, join) = AgentServer::start(agent, ServerOptions::default(), ctx, Some(Arc::new(StopOnCommand))).unwrap();

        handle.cast(Signal::new("test", "finish")).await.unwrap();
        join.await.unwrap();
        assert!(!is_alive(&registry, &id));
    }

    #[tokio::test]
    async fn stop_on_error_policy_stops_after_an_error_directive() {
        struct AlwaysErrors;
        #[async_trait]
        impl SignalHandler for AlwaysErrors {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                Ok((
                    agent.clone(),
                    vec![Directive::Error {
                        error: "boom".to_string(),
                        context: None,
                    }],
                ))
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let id = agent.id.clone();
        let registry: Registry<AgentHandle> = Registry::new();
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), registry.clone());
        let options = ServerOptions::default().with_error_policy(ErrorPolicy::StopOnError);
        let (handle, join) =
            AgentServer::start(agent, options, ctx, Some(Arc::new(AlwaysErrors))).unwrap();

        handle.cast(Signal::new("test", "tick")).await.unwrap();
        join.await.unwrap();
        assert!(!is_alive(&registry, &id));
    }

    #[tokio::test]
    async fn log_only_policy_keeps_running_after_an_error_directive() {
        struct AlwaysErrors;
        #[async_trait]
        impl SignalHandler for AlwaysErrors {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                Ok((
                    agent.clone(),
                    vec![Directive::Error {
                        error: "boom".to_string(),
                        context: None,
                    }],
                ))
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let id = agent.id.clone();
        let registry: Registry<AgentHandle> = Registry::new();
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), registry.clone());
        let (handle, _join) =
            AgentServer::start(agent, ServerOptions::default(), ctx, Some(Arc::new(AlwaysErrors))).unwrap();

        handle.cast(Signal::new("test", "tick")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(is_alive(&registry, &id));
        handle.stop("done").await.unwrap();
    }

    #[tokio::test]
    async fn emit_with_no_directive_dispatch_falls_back_to_server_default() {
        use agentrt_core::DispatchConfig;

        struct EmitWithNoDispatch;
        #[async_trait]
        impl SignalHandler for EmitWithNoDispatch {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                Ok((
                    agent.clone(),
                    vec![Directive::Emit {
                        signal: Signal::new("test", "downstream"),
                        dispatch: None,
                    }],
                ))
            }
        }

        struct RecordingDispatcher(Arc<std::sync::Mutex<Vec<Option<DispatchConfig>>>>);
        #[async_trait]
        impl Dispatcher for RecordingDispatcher {
            async fn dispatch(&self, _signal: Signal, dispatch: Option<DispatchConfig>) {
                self.0.lock().unwrap().push(dispatch);
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), Registry::new())
            .with_dispatcher(Arc::new(RecordingDispatcher(seen.clone())));
        let default_dispatch = json!({"queue": "downstream-default"});
        let options = ServerOptions::default().with_default_dispatch(default_dispatch.clone());
        let (handle, _join) =
            AgentServer::start(agent, options, ctx, Some(Arc::new(EmitWithNoDispatch))).unwrap();

        handle.cast(Signal::new("test", "tick")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(seen.lock().unwrap().as_slice(), [Some(default_dispatch)]);
        handle.stop("done").await.unwrap();
    }

    #[tokio::test]
    async fn emit_without_any_dispatch_is_dropped_before_reaching_the_dispatcher() {
        struct EmitWithNoDispatch;
        #[async_trait]
        impl SignalHandler for EmitWithNoDispatch {
            async fn handle_signal(
                &self,
                agent: &Agent,
                _signal: &Signal,
                _ctx: &StrategyContext,
            ) -> Result<(Agent, Vec<Directive>), AgentRuntimeError> {
                Ok((
                    agent.clone(),
                    vec![Directive::Emit {
                        signal: Signal::new("test", "downstream"),
                        dispatch: None,
                    }],
                ))
            }
        }

        struct CountingDispatcher(Arc<std::sync::atomic::AtomicUsize>);
        #[async_trait]
        impl Dispatcher for CountingDispatcher {
            async fn dispatch(&self, _signal: Signal, _dispatch: Option<agentrt_core::DispatchConfig>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let agent = test_agent(Arc::new(CountingStrategy::new()));
        let calls = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let ctx = ServerContext::new(Arc::new(ActionRegistry::new()), Registry::new())
            .with_dispatcher(Arc::new(CountingDispatcher(calls.clone())));
        let (handle, _join) =
            AgentServer::start(agent, ServerOptions::default(), ctx, Some(Arc::new(EmitWithNoDispatch))).unwrap();

        handle.cast(Signal::new("test", "tick")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(
            calls.load(Ordering::SeqCst),
            0,
            "Dispatcher::dispatch must not be called when no dispatch resolves"
        );
        handle.stop("done").await.unwrap();
    }
}
