//! Client facade — one owned event loop per session.
//!
//! All state (store, connection state, timers) lives in a single actor task.
//! Commands from the UI, transport events, timer fires, and HTTP results are
//! queued and processed one at a time, so nothing here needs a lock.
//!
//! ```text
//! Idle ──subscribe──▶ Connecting ──open──▶ Open
//!  │                      ▲   │              │ unexpected close
//!  │ no identity          │   └──close──┐    ▼
//!  ▼                      └──timer── Reconnecting
//! Failed (polling only)
//! ```

use std::sync::Arc;
use std::time::Duration;

use feedlink_channel::frame::{self, Frame, HEARTBEAT_RESPONSE};
use feedlink_channel::heartbeat::{self, HeartbeatMonitor};
use feedlink_channel::ws::WsTransport;
use feedlink_core::config::FeedConfig;
use feedlink_core::error::{FeedError, Result};
use feedlink_core::traits::{
    ChannelHandle, EventSink, IdentityProvider, Transport, TransportEvent, TransportEventKind,
};
use feedlink_core::types::{ConnectionState, FeedSnapshot};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::api::{FeedApi, HttpFeedApi};
use crate::backoff::ReconnectPolicy;
use crate::events::{FeedEvent, FeedView, Subscription};
use crate::notify::Notifier;
use crate::optimistic::{AckScope, PendingAcks};
use crate::snapshot::SnapshotLoader;
use crate::store::{FeedStore, MergeOutcome};

const EVENT_CAPACITY: usize = 64;

/// Everything the facade talks to.
pub struct Collaborators<T> {
    pub transport: T,
    pub api: Arc<dyn FeedApi>,
    pub identity: Arc<dyn IdentityProvider>,
    pub notifier: Arc<dyn Notifier>,
}

enum Command {
    Subscribe,
    Refresh,
    MarkRead(String),
    MarkAllRead,
    Dispose(oneshot::Sender<()>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadReason {
    Startup,
    Poll,
    Refresh,
    /// After (re)opening the channel, to pick up anything missed.
    Reconcile,
}

enum Internal {
    HeartbeatDue(ChannelHandle),
    RetryDue(u64),
    IdentityPoll(u64),
    PollDue,
    SnapshotLoaded {
        seq: u64,
        reason: LoadReason,
        result: Result<FeedSnapshot>,
    },
    AckSettled {
        ack_id: u64,
        result: Result<()>,
    },
}

/// Live feed for one user session.
pub struct FeedClient {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<FeedView>,
    events: broadcast::Sender<FeedEvent>,
    task: JoinHandle<()>,
}

impl FeedClient {
    /// Spawn the client's event loop. Starts `Idle`; nothing touches the
    /// network until `subscribe`.
    pub fn create<T: Transport + 'static>(config: FeedConfig, parts: Collaborators<T>) -> Self {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let (transport_tx, transport_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(FeedView::default());
        let (events_tx, _) = broadcast::channel(EVENT_CAPACITY);

        let actor = ClientActor {
            loader: SnapshotLoader::new(parts.api.clone(), &config.snapshot),
            store: FeedStore::with_max_items(config.snapshot.max_items),
            policy: ReconnectPolicy::from_config(&config.reconnect),
            config,
            transport: parts.transport,
            api: parts.api,
            identity: parts.identity,
            notifier: parts.notifier,
            acks: PendingAcks::new(),
            heartbeat: HeartbeatMonitor::new(),
            state: ConnectionState::Idle,
            handle: None,
            subscribed: false,
            retry_timer: None,
            retry_seq: 0,
            identity_timer: None,
            identity_seq: 0,
            identity_attempts: 0,
            poller: None,
            inflight: Vec::new(),
            snapshot_seq: 0,
            applied_seq: 0,
            disconnect_noticed: false,
            degraded: false,
            internal: internal_tx,
            transport_sink: transport_tx,
            view: view_tx,
            events: events_tx.clone(),
        };
        let task = tokio::spawn(actor.run(commands_rx, internal_rx, transport_rx));

        Self {
            commands: commands_tx,
            view: view_rx,
            events: events_tx,
            task,
        }
    }

    /// WebSocket transport and HTTP API built from `config`.
    pub fn from_config(
        config: FeedConfig,
        identity: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        config.validate()?;
        let api: Arc<dyn FeedApi> = Arc::new(HttpFeedApi::new(&config)?);
        Ok(Self::create(
            config,
            Collaborators {
                transport: WsTransport::new(),
                api,
                identity,
                notifier,
            },
        ))
    }

    /// Start the feed (first call only) and get a view + event subscription.
    pub fn subscribe(&self) -> Result<Subscription> {
        let sub = Subscription::new(self.view.clone(), self.events.subscribe());
        self.send(Command::Subscribe)?;
        Ok(sub)
    }

    /// Fetch a fresh snapshot now (e.g. the UI became visible again).
    pub fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh)
    }

    /// Optimistically mark one item read; rolled back if the server rejects it.
    pub fn mark_read(&self, id: &str) -> Result<()> {
        self.send(Command::MarkRead(id.to_string()))
    }

    /// Optimistically mark everything read.
    pub fn mark_all_read(&self) -> Result<()> {
        self.send(Command::MarkAllRead)
    }

    pub fn view(&self) -> FeedView {
        self.view.borrow().clone()
    }

    pub fn state(&self) -> ConnectionState {
        self.view.borrow().state
    }

    /// Close the channel, cancel timers and in-flight requests, and stop.
    pub async fn dispose(self) {
        let (tx, rx) = oneshot::channel();
        if self.commands.send(Command::Dispose(tx)).is_ok() {
            let _ = rx.await;
        }
        let _ = self.task.await;
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| FeedError::Disposed)
    }
}

struct ClientActor<T> {
    config: FeedConfig,
    transport: T,
    api: Arc<dyn FeedApi>,
    loader: SnapshotLoader,
    identity: Arc<dyn IdentityProvider>,
    notifier: Arc<dyn Notifier>,
    store: FeedStore,
    acks: PendingAcks,
    policy: ReconnectPolicy,
    heartbeat: HeartbeatMonitor,
    state: ConnectionState,
    handle: Option<ChannelHandle>,
    subscribed: bool,
    retry_timer: Option<JoinHandle<()>>,
    retry_seq: u64,
    identity_timer: Option<JoinHandle<()>>,
    identity_seq: u64,
    identity_attempts: u32,
    poller: Option<JoinHandle<()>>,
    inflight: Vec<JoinHandle<()>>,
    snapshot_seq: u64,
    applied_seq: u64,
    /// A `Disconnected` was emitted and no Open has happened since.
    disconnect_noticed: bool,
    degraded: bool,
    internal: mpsc::UnboundedSender<Internal>,
    transport_sink: EventSink,
    view: watch::Sender<FeedView>,
    events: broadcast::Sender<FeedEvent>,
}

impl<T: Transport + 'static> ClientActor<T> {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut transport_events: mpsc::UnboundedReceiver<TransportEvent>,
    ) {
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(cmd) => {
                        if !self.on_command(cmd) {
                            break;
                        }
                    }
                    // every FeedClient handle dropped
                    None => {
                        self.dispose();
                        break;
                    }
                },
                Some(event) = internal.recv() => self.on_internal(event),
                Some(event) = transport_events.recv() => self.on_transport(event),
            }
        }
        tracing::debug!("Feed client stopped");
    }

    /// Returns `false` once disposed.
    fn on_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Subscribe => self.subscribe(),
            Command::Refresh => self.request_snapshot(LoadReason::Refresh),
            Command::MarkRead(id) => self.acknowledge(AckScope::One(id)),
            Command::MarkAllRead => self.acknowledge(AckScope::All),
            Command::Dispose(reply) => {
                self.dispose();
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn on_internal(&mut self, event: Internal) {
        match event {
            Internal::HeartbeatDue(handle) => {
                if self.handle == Some(handle) && self.state.is_open() {
                    heartbeat::beat(&mut self.transport, handle);
                }
            }
            Internal::RetryDue(seq) => {
                if seq == self.retry_seq && self.state == ConnectionState::Reconnecting {
                    self.retry_timer = None;
                    self.try_connect();
                }
            }
            Internal::IdentityPoll(seq) => {
                if seq == self.identity_seq && self.state == ConnectionState::Idle && self.subscribed {
                    self.identity_timer = None;
                    self.try_connect();
                }
            }
            Internal::PollDue => self.request_snapshot(LoadReason::Poll),
            Internal::SnapshotLoaded { seq, reason, result } => self.apply_snapshot(seq, reason, result),
            Internal::AckSettled { ack_id, result } => self.settle_ack(ack_id, result),
        }
    }

    fn on_transport(&mut self, event: TransportEvent) {
        let handle = event.handle;
        if self.handle != Some(handle) {
            tracing::trace!("Ignoring event from stale channel {handle}");
            return;
        }
        match event.kind {
            TransportEventKind::Open => self.on_open(handle),
            TransportEventKind::Message(text) => self.on_message(handle, &text),
            TransportEventKind::Error(msg) => tracing::warn!("Channel {handle} error: {msg}"),
            TransportEventKind::Close(code) => self.on_close(handle, code),
        }
    }

    // ── lifecycle ────────────────────────────────────────────

    fn subscribe(&mut self) {
        if self.subscribed {
            return;
        }
        self.subscribed = true;
        tracing::info!("📡 Feed client subscribed");

        self.start_poller();
        self.request_snapshot(LoadReason::Startup);
        if self.config.channel.enabled {
            self.try_connect();
        } else {
            tracing::info!("Live channel disabled — polling only");
        }
    }

    fn try_connect(&mut self) {
        let Some(identity) = self.identity.current() else {
            self.await_identity();
            return;
        };
        self.identity_attempts = 0;
        if let Some(timer) = self.identity_timer.take() {
            timer.abort();
        }

        self.set_state(ConnectionState::Connecting);
        let endpoint = self.config.channel_endpoint();
        let handle = self.transport.open(&endpoint, &identity, self.transport_sink.clone());
        tracing::info!("Opening channel {handle} as '{identity}'");
        self.handle = Some(handle);
    }

    fn await_identity(&mut self) {
        match self.state {
            ConnectionState::Idle => {
                self.identity_attempts += 1;
                let max = self.config.identity_poll.max_attempts;
                if self.identity_attempts >= max {
                    tracing::warn!("Identity unavailable after {max} attempts — live updates disabled");
                    self.set_state(ConnectionState::Failed);
                    self.emit(FeedEvent::Degraded(format!(
                        "{}; live updates disabled",
                        FeedError::IdentityUnavailable
                    )));
                    return;
                }
                tracing::debug!(
                    "Identity not ready (attempt {}/{max}), retrying in {}ms",
                    self.identity_attempts,
                    self.config.identity_poll.interval_ms
                );
                if let Some(timer) = self.identity_timer.take() {
                    timer.abort();
                }
                self.identity_seq += 1;
                let seq = self.identity_seq;
                self.identity_timer =
                    Some(self.schedule(self.config.identity_poll.interval(), Internal::IdentityPoll(seq)));
            }
            ConnectionState::Reconnecting => {
                tracing::debug!("Identity gone while reconnecting; backing off");
                let delay = self.policy.on_unexpected_close();
                self.schedule_retry(delay);
            }
            _ => {}
        }
    }

    fn on_open(&mut self, handle: ChannelHandle) {
        if self.state != ConnectionState::Connecting {
            return;
        }
        self.set_state(ConnectionState::Open);
        self.policy.reset();

        let internal = self.internal.clone();
        self.heartbeat.start(handle, self.config.channel.heartbeat_interval(), move |h| {
            internal.send(Internal::HeartbeatDue(h)).is_ok()
        });

        if self.disconnect_noticed {
            self.disconnect_noticed = false;
            tracing::info!("✅ Live channel restored");
            self.emit(FeedEvent::Reconnected);
        }
        self.request_snapshot(LoadReason::Reconcile);
    }

    fn on_message(&mut self, handle: ChannelHandle, text: &str) {
        match frame::parse_frame(text) {
            Ok(Frame::Notification(item)) => {
                tracing::debug!("🔔 Notification {} on {handle}", item.id);
                let outcome = self.store.merge_incoming(item.clone());
                self.reapply_pending();
                if outcome == MergeOutcome::Inserted && !item.acknowledged {
                    self.notifier.notify(&item);
                }
                self.emit(FeedEvent::ItemReceived(item));
                self.publish();
            }
            Ok(Frame::HeartbeatRequest) => {
                if let Err(e) = self.transport.send(handle, HEARTBEAT_RESPONSE) {
                    tracing::debug!("Could not answer ping on {handle}: {e}");
                }
            }
            Ok(Frame::HeartbeatResponse) => tracing::trace!("💓 pong ← {handle}"),
            Ok(Frame::Ignored(kind)) => tracing::debug!("Ignoring '{kind}' frame on {handle}"),
            Err(e) => tracing::warn!("Dropping frame on {handle}: {e}"),
        }
    }

    fn on_close(&mut self, handle: ChannelHandle, code: Option<u16>) {
        self.handle = None;
        self.heartbeat.stop();
        if !matches!(self.state, ConnectionState::Open | ConnectionState::Connecting) {
            return;
        }

        tracing::warn!("Channel {handle} closed unexpectedly (code {code:?})");
        self.set_state(ConnectionState::Reconnecting);
        if !self.disconnect_noticed {
            self.disconnect_noticed = true;
            self.emit(FeedEvent::Disconnected);
        }
        let delay = self.policy.on_unexpected_close();
        self.schedule_retry(delay);
    }

    fn dispose(&mut self) {
        tracing::info!("Disposing feed client");
        if let Some(handle) = self.handle.take() {
            self.transport.close(handle);
        }
        self.heartbeat.stop();
        let timers = [self.retry_timer.take(), self.identity_timer.take(), self.poller.take()];
        for timer in timers.into_iter().flatten() {
            timer.abort();
        }
        for task in self.inflight.drain(..) {
            task.abort();
        }
        self.acks.clear();
        self.set_state(ConnectionState::Idle);
        self.publish();
    }

    // ── timers ───────────────────────────────────────────────

    fn schedule(&self, delay: Duration, event: Internal) -> JoinHandle<()> {
        let tx = self.internal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(event);
        })
    }

    /// At most one retry is ever pending.
    fn schedule_retry(&mut self, delay: Duration) {
        if let Some(timer) = self.retry_timer.take() {
            timer.abort();
        }
        self.retry_seq += 1;
        let seq = self.retry_seq;
        tracing::info!(
            "🔄 Reconnecting in {}ms (attempt {})",
            delay.as_millis(),
            self.policy.attempt()
        );
        self.retry_timer = Some(self.schedule(delay, Internal::RetryDue(seq)));
    }

    fn start_poller(&mut self) {
        let interval = self.config.snapshot.poll_interval();
        if interval.is_zero() {
            return;
        }
        let tx = self.internal.clone();
        self.poller = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(Internal::PollDue).is_err() {
                    break;
                }
            }
        }));
    }

    // ── HTTP ─────────────────────────────────────────────────

    fn track(&mut self, task: JoinHandle<()>) {
        self.inflight.retain(|t| !t.is_finished());
        self.inflight.push(task);
    }

    fn request_snapshot(&mut self, reason: LoadReason) {
        self.snapshot_seq += 1;
        let seq = self.snapshot_seq;
        let loader = self.loader.clone();
        let page = loader.first_page();
        let tx = self.internal.clone();
        tracing::debug!("Snapshot #{seq} requested ({reason:?})");
        self.track(tokio::spawn(async move {
            let result = loader.fetch_checked(page).await;
            let _ = tx.send(Internal::SnapshotLoaded { seq, reason, result });
        }));
    }

    fn apply_snapshot(&mut self, seq: u64, reason: LoadReason, result: Result<FeedSnapshot>) {
        if seq <= self.applied_seq {
            tracing::debug!("Discarding stale snapshot #{seq}");
            return;
        }
        match result {
            Ok(snapshot) => {
                self.applied_seq = seq;
                if reason == LoadReason::Reconcile {
                    self.store.merge_snapshot(snapshot);
                } else {
                    self.store.load_snapshot(snapshot);
                }
                self.reapply_pending();
                if self.degraded {
                    self.degraded = false;
                    tracing::info!("Snapshot source recovered");
                }
            }
            Err(e) => {
                if !self.degraded {
                    self.degraded = true;
                    let reason = if e.is_transient() {
                        format!("snapshot unavailable, retrying on next poll: {e}")
                    } else {
                        format!("snapshot rejected by server: {e}")
                    };
                    self.emit(FeedEvent::Degraded(reason));
                }
            }
        }
        self.publish();
    }

    fn acknowledge(&mut self, scope: AckScope) {
        let ack = self.store.acknowledge(scope.clone());
        self.publish();
        if matches!(scope, AckScope::One(_)) && ack.is_noop() {
            tracing::debug!("Nothing to acknowledge for {scope:?}");
            return;
        }

        let ack_id = self.acks.register(ack);
        let api = self.api.clone();
        let tx = self.internal.clone();
        let timeout = self.config.snapshot.request_timeout();
        self.track(tokio::spawn(async move {
            let call = async {
                match &scope {
                    AckScope::One(id) => api.mark_read(id).await,
                    AckScope::All => api.mark_all_read().await,
                }
            };
            let result = match tokio::time::timeout(timeout, call).await {
                Ok(result) => result,
                Err(_) => Err(FeedError::Timeout(timeout.as_millis() as u64)),
            };
            let _ = tx.send(Internal::AckSettled { ack_id, result });
        }));
    }

    /// Server data may predate an acknowledgement still in flight; keep
    /// those items read until the server answers.
    fn reapply_pending(&mut self) {
        for ack in self.acks.iter() {
            self.store.reapply(ack);
        }
    }

    fn settle_ack(&mut self, ack_id: u64, result: Result<()>) {
        let Some(ack) = self.acks.take(ack_id) else {
            return;
        };
        match result {
            Ok(()) => tracing::debug!("Acknowledged {:?}", ack.scope),
            Err(e) => {
                let restored = self.store.rollback(&ack);
                tracing::warn!("Acknowledgement rejected, rolled back {restored} item(s): {e}");
                let message = match &ack.scope {
                    AckScope::One(id) => format!("Failed to mark notification {id} as read: {e}"),
                    AckScope::All => format!("Failed to mark all notifications as read: {e}"),
                };
                self.emit(FeedEvent::ActionFailed(message));
                self.publish();
            }
        }
    }

    // ── output ───────────────────────────────────────────────

    fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(next) {
            tracing::error!("Refusing illegal transition {} → {next}", self.state);
            return;
        }
        tracing::debug!("State {} → {next}", self.state);
        self.state = next;
        self.emit(FeedEvent::StateChanged(next));
        self.publish();
    }

    fn emit(&self, event: FeedEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }

    fn publish(&self) {
        self.view.send_replace(FeedView {
            items: self.store.to_vec(),
            unread_count: self.store.unread_count(),
            total: self.store.total(),
            state: self.state,
            degraded: self.degraded,
        });
    }
}
