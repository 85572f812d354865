//! The messenger actor and its handle.
//!
//! All connection state, the subscribed-channel set, and the correlation
//! tracker live inside a single task; a cloneable [`MessengerHandle`]
//! reaches it over a command channel, so no mutation ever happens outside
//! the actor. Transport publishes are spawned rather than awaited in the
//! loop, which keeps a slow broker from stalling dispatch or heartbeats.
//!
//! ```text
//!             commands                    frames / link status
//!   Handle ─────────────► Messenger ◄──────────────────────── Transport
//!                            │
//!                            └─► mpsc::Receiver<MessengerEvent> (host)
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

use crate::config::MessengerConfig;
use crate::correlate::{CommandOutcome, CorrelationTracker};
use crate::dispatch::{self, DropReason};
use crate::error::{MessagingError, TransportError};
use crate::frame::Frame;
use crate::heartbeat;
use crate::message::{Envelope, MessageKind, Payload, Priority, Role};
use crate::transport::{LinkEvent, Transport, TransportEvent};

/// Connection lifecycle of a messenger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected; the initial state.
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Subscribed and heartbeating.
    Connected,
    /// The transport is re-establishing a dropped link on its own.
    Reconnecting,
    /// The link failed; stays here until a manual connect.
    Failed(String),
}

impl ConnectionState {
    /// Whether the state machine allows moving to `next`.
    ///
    /// Failure and disconnect are reachable from everywhere; everything
    /// else follows connect → connected → reconnecting → connected.
    /// Recovery from [`ConnectionState::Failed`] requires a manual
    /// connect, never a transport-initiated link event.
    pub fn can_transition_to(&self, next: &ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (_, Failed(_)) | (_, Disconnected) => true,
            (Disconnected, Connecting) => true,
            (Failed(_), Connecting) => true,
            (Connecting, Connected) => true,
            (Connected, Reconnecting) => true,
            (Reconnecting, Connected) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => f.write_str("disconnected"),
            Self::Connecting => f.write_str("connecting"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting => f.write_str("reconnecting"),
            Self::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

/// Events delivered to the host on the observer channel.
#[derive(Debug, Clone)]
pub enum MessengerEvent {
    /// A decoded envelope from the counterpart daemon.
    Message(Envelope),
    /// The connection state changed.
    ConnectionStatus(ConnectionState),
    /// A transport-level failure the host should know about.
    Error(String),
}

enum MessengerCommand {
    Connect {
        respond_to: oneshot::Sender<Result<(), MessagingError>>,
    },
    Disconnect {
        respond_to: oneshot::Sender<()>,
    },
    Publish {
        envelope: Envelope,
        channel: Option<String>,
        respond_to: oneshot::Sender<Result<Uuid, MessagingError>>,
    },
    SendCommand {
        envelope: Envelope,
        timeout: Option<Duration>,
        respond_to: oneshot::Sender<CommandOutcome>,
    },
    State {
        respond_to: oneshot::Sender<ConnectionState>,
    },
}

/// Notes spawned publish tasks send back to the actor.
enum PublishNote {
    CommandPublishFailed { id: Uuid, error: TransportError },
}

/// Handle for driving a running [`Messenger`]. Cheap to clone.
#[derive(Clone)]
pub struct MessengerHandle {
    command_tx: mpsc::Sender<MessengerCommand>,
    role: Role,
}

impl MessengerHandle {
    /// Connect to the shared channels and start heartbeating.
    ///
    /// Fails with [`MessagingError::NotConfigured`] when transport
    /// credentials are missing. Connecting while already connected (or
    /// mid-connect) is a no-op.
    pub async fn connect(&self) -> Result<(), MessagingError> {
        let (tx, rx) = oneshot::channel();
        self.send(MessengerCommand::Connect { respond_to: tx }).await?;
        rx.await.map_err(|_| MessagingError::Closed)?
    }

    /// Disconnect: stop heartbeats, unsubscribe the recorded channels,
    /// clear connection state. Idempotent, and still tears the
    /// subscriptions down after a transport-reported drop.
    pub async fn disconnect(&self) -> Result<(), MessagingError> {
        let (tx, rx) = oneshot::channel();
        self.send(MessengerCommand::Disconnect { respond_to: tx })
            .await?;
        rx.await.map_err(|_| MessagingError::Closed)
    }

    /// Publish a payload from this daemon, routed to the kind's default
    /// channel. Resolves with the envelope id once the transport acks.
    pub async fn publish(&self, payload: Payload) -> Result<Uuid, MessagingError> {
        self.publish_envelope(Envelope::new(self.role, payload), None)
            .await
    }

    /// Publish a prebuilt envelope, optionally overriding the channel.
    /// This is how a daemon sends replies built with
    /// [`Envelope::reply_ok`] / [`Envelope::reply_err`].
    pub async fn publish_envelope(
        &self,
        envelope: Envelope,
        channel: Option<String>,
    ) -> Result<Uuid, MessagingError> {
        let (tx, rx) = oneshot::channel();
        self.send(MessengerCommand::Publish {
            envelope,
            channel,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| MessagingError::Closed)?
    }

    /// Send a command and wait for its correlated response, up to the
    /// configured response timeout.
    ///
    /// Resolves with the response envelope, or fails with
    /// [`MessagingError::Timeout`] once the deadline passes.
    pub async fn send_command(
        &self,
        command: impl Into<String>,
        parameters: Option<HashMap<String, String>>,
        priority: Priority,
    ) -> Result<Envelope, MessagingError> {
        self.send_command_inner(command.into(), parameters, priority, None)
            .await
    }

    /// [`send_command`](Self::send_command) with a per-call timeout.
    pub async fn send_command_with_timeout(
        &self,
        command: impl Into<String>,
        parameters: Option<HashMap<String, String>>,
        priority: Priority,
        timeout: Duration,
    ) -> Result<Envelope, MessagingError> {
        self.send_command_inner(command.into(), parameters, priority, Some(timeout))
            .await
    }

    /// Current connection state.
    pub async fn state(&self) -> Result<ConnectionState, MessagingError> {
        let (tx, rx) = oneshot::channel();
        self.send(MessengerCommand::State { respond_to: tx }).await?;
        rx.await.map_err(|_| MessagingError::Closed)
    }

    async fn send_command_inner(
        &self,
        command: String,
        parameters: Option<HashMap<String, String>>,
        priority: Priority,
        timeout: Option<Duration>,
    ) -> Result<Envelope, MessagingError> {
        if command.is_empty() {
            return Err(MessagingError::Encoding(
                "command verb must not be empty".to_string(),
            ));
        }
        let envelope = Envelope::new(
            self.role,
            Payload::Command {
                command,
                parameters,
                priority,
                requires_response: true,
            },
        );
        let (tx, rx) = oneshot::channel();
        self.send(MessengerCommand::SendCommand {
            envelope,
            timeout,
            respond_to: tx,
        })
        .await?;
        rx.await.map_err(|_| MessagingError::Closed)?
    }

    async fn send(&self, command: MessengerCommand) -> Result<(), MessagingError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| MessagingError::Closed)
    }
}

/// The messaging actor. Construct with [`Messenger::new`], then spawn
/// [`run`](Self::run) on the runtime.
pub struct Messenger {
    config: MessengerConfig,
    transport: Arc<dyn Transport>,
    transport_rx: mpsc::Receiver<TransportEvent>,
    transport_closed: bool,
    command_rx: mpsc::Receiver<MessengerCommand>,
    notes_tx: mpsc::Sender<PublishNote>,
    notes_rx: mpsc::Receiver<PublishNote>,
    events_tx: mpsc::Sender<MessengerEvent>,
    state: ConnectionState,
    subscribed: Vec<String>,
    tracker: CorrelationTracker,
    ticker: Option<Interval>,
    started_at: Instant,
}

impl Messenger {
    /// Create a messenger over an injected transport.
    ///
    /// Returns the actor, a handle for callers, and the single observer
    /// receiver for decoded messages, state changes, and errors.
    pub fn new(
        config: MessengerConfig,
        transport: Arc<dyn Transport>,
        transport_rx: mpsc::Receiver<TransportEvent>,
    ) -> (Messenger, MessengerHandle, mpsc::Receiver<MessengerEvent>) {
        let (command_tx, command_rx) = mpsc::channel(256);
        let (events_tx, events_rx) = mpsc::channel(256);
        let (notes_tx, notes_rx) = mpsc::channel(32);

        let handle = MessengerHandle {
            command_tx,
            role: config.role,
        };
        let messenger = Self {
            config,
            transport,
            transport_rx,
            transport_closed: false,
            command_rx,
            notes_tx,
            notes_rx,
            events_tx,
            state: ConnectionState::Disconnected,
            subscribed: Vec::new(),
            tracker: CorrelationTracker::new(),
            ticker: None,
            started_at: Instant::now(),
        };

        (messenger, handle, events_rx)
    }

    /// Run the actor until every handle is dropped.
    pub async fn run(mut self) {
        info!(role = %self.config.role, "messenger started");

        loop {
            let deadline = self.tracker.next_deadline();
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd).await,
                    None => break,
                },
                Some(note) = self.notes_rx.recv() => self.handle_note(note),
                event = self.transport_rx.recv(), if !self.transport_closed => match event {
                    Some(event) => self.handle_transport_event(event).await,
                    None => {
                        self.transport_closed = true;
                        warn!("transport event stream closed");
                        if self.state == ConnectionState::Connected {
                            let cause = "transport event stream closed".to_string();
                            self.emit(MessengerEvent::Error(cause.clone())).await;
                            self.set_state(ConnectionState::Failed(cause)).await;
                        }
                    }
                },
                _ = Self::tick(&mut self.ticker), if self.ticker.is_some() => {
                    self.publish_heartbeat();
                }
                _ = Self::sleep_until(deadline), if deadline.is_some() => {
                    for id in self.tracker.expire(Instant::now()) {
                        warn!(correlation = %id, "command response timed out");
                    }
                }
            }
        }

        info!(role = %self.config.role, "messenger stopped");
    }

    async fn handle_command(&mut self, command: MessengerCommand) {
        match command {
            MessengerCommand::Connect { respond_to } => {
                let result = self.handle_connect().await;
                let _ = respond_to.send(result);
            }
            MessengerCommand::Disconnect { respond_to } => {
                self.handle_disconnect().await;
                let _ = respond_to.send(());
            }
            MessengerCommand::Publish {
                envelope,
                channel,
                respond_to,
            } => self.handle_publish(envelope, channel, respond_to),
            MessengerCommand::SendCommand {
                envelope,
                timeout,
                respond_to,
            } => self.handle_send_command(envelope, timeout, respond_to),
            MessengerCommand::State { respond_to } => {
                let _ = respond_to.send(self.state.clone());
            }
        }
    }

    async fn handle_connect(&mut self) -> Result<(), MessagingError> {
        if matches!(
            self.state,
            ConnectionState::Connected | ConnectionState::Connecting | ConnectionState::Reconnecting
        ) {
            debug!(state = %self.state, "connect requested while already active");
            return Ok(());
        }
        if !self.config.is_configured() {
            return Err(MessagingError::NotConfigured);
        }

        self.set_state(ConnectionState::Connecting).await;
        let channels = self.config.channels.subscriptions(self.config.role);
        let subscribe = self.transport.subscribe(channels.clone());
        let outcome = tokio::time::timeout(self.config.connect_timeout, subscribe).await;

        match outcome {
            Ok(Ok(())) => {
                self.subscribed = channels;
                self.set_state(ConnectionState::Connected).await;
                info!(
                    role = %self.config.role,
                    channels = self.subscribed.len(),
                    "connected"
                );
                Ok(())
            }
            Ok(Err(err)) => {
                error!(error = %err, "subscribe failed");
                self.set_state(ConnectionState::Failed(err.to_string())).await;
                Err(err.into())
            }
            Err(_) => {
                let err = TransportError::Subscribe(format!(
                    "no broker ack within {:?}",
                    self.config.connect_timeout
                ));
                error!(error = %err, "connect timed out");
                self.set_state(ConnectionState::Failed(err.to_string())).await;
                Err(err.into())
            }
        }
    }

    async fn handle_disconnect(&mut self) {
        // Runs unconditionally: a transport-reported Down changes the state
        // but leaves subscriptions registered, so the teardown cannot gate
        // on the state label. Stop the ticker before anything awaits so no
        // further beat can fire.
        self.ticker = None;
        let channels = std::mem::take(&mut self.subscribed);
        if !channels.is_empty() {
            if let Err(err) = self.transport.unsubscribe(channels).await {
                warn!(error = %err, "unsubscribe failed during disconnect");
            }
        }
        self.set_state(ConnectionState::Disconnected).await;
        info!(role = %self.config.role, "disconnected");
    }

    fn handle_publish(
        &self,
        envelope: Envelope,
        channel: Option<String>,
        respond_to: oneshot::Sender<Result<Uuid, MessagingError>>,
    ) {
        let bytes = match Frame::encode(&envelope).and_then(|frame| frame.to_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                let _ = respond_to.send(Err(err));
                return;
            }
        };
        let channel = channel.unwrap_or_else(|| {
            self.config
                .channels
                .publish_channel(envelope.source, envelope.kind())
                .to_string()
        });
        debug!(channel = %channel, kind = %envelope.kind(), id = %envelope.id, "publishing");

        let id = envelope.id;
        let transport = Arc::clone(&self.transport);
        tokio::spawn(async move {
            let result = transport
                .publish(channel, bytes)
                .await
                .map(|_| id)
                .map_err(MessagingError::from);
            let _ = respond_to.send(result);
        });
    }

    fn handle_send_command(
        &mut self,
        envelope: Envelope,
        timeout: Option<Duration>,
        respond_to: oneshot::Sender<CommandOutcome>,
    ) {
        let id = envelope.id;
        let deadline = Instant::now() + timeout.unwrap_or(self.config.response_timeout);
        if self.tracker.register(id, deadline, respond_to).is_err() {
            warn!(correlation = %id, "rejected duplicate correlation id");
            return;
        }

        let bytes = match Frame::encode(&envelope).and_then(|frame| frame.to_bytes()) {
            Ok(bytes) => bytes,
            Err(err) => {
                self.tracker.fail(id, err);
                return;
            }
        };
        let channel = self
            .config
            .channels
            .publish_channel(envelope.source, MessageKind::Command)
            .to_string();
        debug!(channel = %channel, correlation = %id, "publishing command");

        let transport = Arc::clone(&self.transport);
        let notes = self.notes_tx.clone();
        tokio::spawn(async move {
            if let Err(error) = transport.publish(channel, bytes).await {
                let _ = notes
                    .send(PublishNote::CommandPublishFailed { id, error })
                    .await;
            }
        });
    }

    fn handle_note(&mut self, note: PublishNote) {
        match note {
            PublishNote::CommandPublishFailed { id, error } => {
                warn!(correlation = %id, error = %error, "command publish failed");
                self.tracker.fail(id, error.into());
            }
        }
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Frame { channel, bytes } => self.handle_frame(&channel, &bytes).await,
            TransportEvent::Status(link) => self.handle_link_event(link).await,
        }
    }

    async fn handle_frame(&mut self, channel: &str, bytes: &[u8]) {
        match dispatch::classify(bytes, self.config.role) {
            Ok(envelope) => {
                if let Payload::Response { correlation_id, .. } = &envelope.payload {
                    let correlation = *correlation_id;
                    if self.tracker.resolve(correlation, envelope.clone()) {
                        debug!(correlation = %correlation, "response matched pending command");
                        return;
                    }
                    // Already timed out, or a duplicate delivery; the
                    // observer gets to see it instead.
                    debug!(correlation = %correlation, "response without pending command");
                }
                trace!(channel = %channel, kind = %envelope.kind(), "delivering message");
                self.emit(MessengerEvent::Message(envelope)).await;
            }
            Err(DropReason::SelfEcho) => {
                trace!(channel = %channel, "suppressed own frame");
            }
            Err(DropReason::Unsupported(kind)) => {
                warn!(channel = %channel, kind = %kind, "dropping frame with unsupported kind");
            }
            Err(DropReason::Malformed(detail)) => {
                warn!(channel = %channel, error = %detail, "dropping undecodable frame");
            }
        }
    }

    async fn handle_link_event(&mut self, link: LinkEvent) {
        match link {
            LinkEvent::Up => self.set_state(ConnectionState::Connected).await,
            LinkEvent::Down => self.set_state(ConnectionState::Disconnected).await,
            LinkEvent::Reconnecting => self.set_state(ConnectionState::Reconnecting).await,
            LinkEvent::Error(cause) => {
                error!(cause = %cause, "transport reported failure");
                self.emit(MessengerEvent::Error(cause.clone())).await;
                self.set_state(ConnectionState::Failed(cause)).await;
            }
        }
    }

    /// Apply a state change, keeping the ticker and observer in sync.
    /// Transitions the state machine forbids are logged and ignored.
    async fn set_state(&mut self, next: ConnectionState) {
        if self.state == next {
            return;
        }
        if !self.state.can_transition_to(&next) {
            warn!(from = %self.state, to = %next, "ignoring invalid state transition");
            return;
        }
        info!(from = %self.state, to = %next, "connection state changed");
        self.state = next.clone();

        if self.state == ConnectionState::Connected {
            self.start_heartbeat();
        } else {
            self.ticker = None;
        }
        self.emit(MessengerEvent::ConnectionStatus(next)).await;
    }

    /// Arm the heartbeat ticker and publish the first beat right away.
    fn start_heartbeat(&mut self) {
        let period = self.config.heartbeat_interval;
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.ticker = Some(ticker);
        self.publish_heartbeat();
    }

    /// Fire-and-forget one heartbeat; a failed beat is logged, never fatal.
    fn publish_heartbeat(&self) {
        let payload = heartbeat::heartbeat_payload(self.started_at.elapsed());
        let envelope = Envelope::new(self.config.role, payload);
        let channel = self
            .config
            .channels
            .publish_channel(self.config.role, MessageKind::Heartbeat)
            .to_string();

        match Frame::encode(&envelope).and_then(|frame| frame.to_bytes()) {
            Ok(bytes) => {
                trace!(channel = %channel, id = %envelope.id, "heartbeat");
                let transport = Arc::clone(&self.transport);
                tokio::spawn(async move {
                    if let Err(err) = transport.publish(channel, bytes).await {
                        warn!(error = %err, "heartbeat publish failed");
                    }
                });
            }
            Err(err) => warn!(error = %err, "failed to encode heartbeat"),
        }
    }

    async fn emit(&self, event: MessengerEvent) {
        let _ = self.events_tx.send(event).await;
    }

    async fn tick(ticker: &mut Option<Interval>) {
        match ticker {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    async fn sleep_until(deadline: Option<Instant>) {
        match deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }
}
