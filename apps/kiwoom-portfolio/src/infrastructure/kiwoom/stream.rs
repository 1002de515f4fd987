//! Realtime Tick Receiver
//!
//! Maintains the single WebSocket connection to the Kiwoom realtime feed
//! and writes the latest price per instrument to the price board.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Disconnected ──► Connecting ──LOGIN ack──► Authenticated ──first tick──► Streaming
//!       ▲                                                                     │
//!       └──────────────────── transport failure / close ◄─────────────────────┘
//! ```
//!
//! 1. Connect and send `{"trnm":"LOGIN","token":"..."}`
//! 2. Wait for the `LOGIN` acknowledgment; a non-zero `return_code` stops
//!    the receiver for good
//! 3. Send one `REG` frame covering every requested instrument
//! 4. Echo each `PING` frame back unchanged
//! 5. Record every positive price from `REAL` and flat tick frames
//!
//! Subscriptions arrive over a command channel and are kept across
//! reconnects, so a new session replays them after login.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Message, Utf8Bytes};
use tokio_util::sync::CancellationToken;

use super::auth::AccessToken;
use super::codec::{CodecError, JsonCodec, StreamFrame};
use super::messages::{LoginAck, LoginRequest, RegistrationAck, RegistrationRequest};
use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{SubscriptionError, SubscriptionPort};
use crate::domain::ticks::{PriceBoardWriter, Tick};
use crate::infrastructure::metrics;

/// Time allowed between connecting and the `LOGIN` acknowledgment.
pub const LOGIN_TIMEOUT: Duration = Duration::from_secs(10);

const COMMAND_BUFFER: usize = 64;

// =============================================================================
// Error Type
// =============================================================================

/// Errors that end a receiver session.
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Outbound frame could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// Server rejected the login.
    #[error("login rejected ({code:?}): {message}")]
    LoginRejected {
        /// `return_code` from the acknowledgment.
        code: Option<i64>,
        /// `return_msg` from the acknowledgment.
        message: String,
    },

    /// No login acknowledgment within the timeout.
    #[error("login not acknowledged within {0:?}")]
    LoginTimeout(Duration),

    /// Server closed the connection.
    #[error("connection closed")]
    ConnectionClosed,

    /// Reconnection disabled or attempts exhausted.
    #[error("reconnection gave up after {attempts} attempts")]
    ReconnectExhausted {
        /// Attempts made since the last successful login.
        attempts: u32,
    },
}

impl StreamError {
    /// Metric label for the error.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WebSocket(_) => "websocket",
            Self::Codec(_) => "codec",
            Self::LoginRejected { .. } => "login_rejected",
            Self::LoginTimeout(_) => "login_timeout",
            Self::ConnectionClosed => "closed",
            Self::ReconnectExhausted { .. } => "reconnect_exhausted",
        }
    }
}

// =============================================================================
// State and Events
// =============================================================================

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// No connection.
    #[default]
    Disconnected,
    /// Connected, waiting for the login acknowledgment.
    Connecting,
    /// Logged in, no tick yet.
    Authenticated,
    /// Ticks are flowing.
    Streaming,
}

impl StreamState {
    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticated => "authenticated",
            Self::Streaming => "streaming",
        }
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle events emitted by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Opening a connection.
    Connecting,
    /// Login acknowledged.
    Authenticated,
    /// First tick of the session recorded.
    Streaming,
    /// Connection lost or closed.
    Disconnected,
    /// Waiting to reconnect.
    Reconnecting {
        /// Attempt number since the last login.
        attempt: u32,
    },
    /// Registration frame sent.
    Subscribed {
        /// Codes registered.
        codes: Vec<String>,
    },
    /// Non-fatal server or frame error.
    Error(String),
}

impl StreamEvent {
    /// State implied by the event, if it changes state.
    #[must_use]
    pub const fn state(&self) -> Option<StreamState> {
        match self {
            Self::Connecting => Some(StreamState::Connecting),
            Self::Authenticated => Some(StreamState::Authenticated),
            Self::Streaming => Some(StreamState::Streaming),
            Self::Disconnected | Self::Reconnecting { .. } => Some(StreamState::Disconnected),
            Self::Subscribed { .. } | Self::Error(_) => None,
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Receiver configuration.
#[derive(Debug, Clone)]
pub struct TickReceiverConfig {
    /// WebSocket URL (e.g. `wss://mockapi.kiwoom.com:10000/api/dostk/websocket`).
    pub url: String,
    /// Access token for the `LOGIN` frame.
    pub token: AccessToken,
    /// Registration group number.
    pub group: String,
    /// Realtime types to register (e.g. `0B`).
    pub types: Vec<String>,
    /// Reconnection policy.
    pub reconnect: ReconnectConfig,
    /// Login acknowledgment timeout.
    pub login_timeout: Duration,
}

impl TickReceiverConfig {
    /// Trade-execution (`0B`) feed in group `1` with default reconnection.
    #[must_use]
    pub fn new(url: impl Into<String>, token: AccessToken) -> Self {
        Self {
            url: url.into(),
            token,
            group: "1".to_string(),
            types: vec!["0B".to_string()],
            reconnect: ReconnectConfig::default(),
            login_timeout: LOGIN_TIMEOUT,
        }
    }

    /// Replace the reconnection policy.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

// =============================================================================
// Handle
// =============================================================================

#[derive(Debug)]
enum Command {
    Subscribe(Vec<String>),
    Unsubscribe(Vec<String>),
}

/// Cloneable handle for requesting subscriptions.
#[derive(Debug, Clone)]
pub struct TickReceiverHandle {
    commands: mpsc::Sender<Command>,
}

impl TickReceiverHandle {
    /// Whether the receiver task has stopped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[async_trait]
impl SubscriptionPort for TickReceiverHandle {
    async fn subscribe(&self, codes: Vec<String>) -> Result<(), SubscriptionError> {
        self.commands
            .send(Command::Subscribe(codes))
            .await
            .map_err(|_| SubscriptionError::FeedStopped)
    }

    async fn unsubscribe(&self, codes: Vec<String>) -> Result<(), SubscriptionError> {
        self.commands
            .send(Command::Unsubscribe(codes))
            .await
            .map_err(|_| SubscriptionError::FeedStopped)
    }
}

// =============================================================================
// Receiver
// =============================================================================

/// Session-local flags.
#[derive(Debug, Default)]
struct Session {
    authenticated: bool,
    streaming: bool,
}

/// Background task owning the WebSocket and the price board writer.
pub struct TickReceiver {
    config: TickReceiverConfig,
    codec: JsonCodec,
    writer: PriceBoardWriter,
    event_tx: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
    commands: mpsc::Receiver<Command>,
    commands_open: bool,
    subscriptions: BTreeSet<String>,
}

impl std::fmt::Debug for TickReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickReceiver")
            .field("url", &self.config.url)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

impl TickReceiver {
    /// Create a receiver and its subscription handle.
    #[must_use]
    pub fn new(
        config: TickReceiverConfig,
        writer: PriceBoardWriter,
        event_tx: mpsc::Sender<StreamEvent>,
        cancel: CancellationToken,
    ) -> (Self, TickReceiverHandle) {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        (
            Self {
                config,
                codec: JsonCodec::new(),
                writer,
                event_tx,
                cancel,
                commands: rx,
                commands_open: true,
                subscriptions: BTreeSet::new(),
            },
            TickReceiverHandle { commands: tx },
        )
    }

    /// Run until cancelled, the login is rejected, or reconnection gives up.
    ///
    /// # Errors
    ///
    /// Returns `StreamError::LoginRejected` on a rejected login and
    /// `StreamError::ReconnectExhausted` when the policy stops retrying.
    pub async fn run(mut self) -> Result<(), StreamError> {
        let mut policy = ReconnectPolicy::new(self.config.reconnect.clone());

        loop {
            if self.cancel.is_cancelled() {
                tracing::info!("Tick receiver cancelled");
                return Ok(());
            }

            self.emit(StreamEvent::Connecting).await;

            let err = match self.connect_and_run(&mut policy).await {
                Ok(()) => {
                    tracing::info!("Tick receiver stopped");
                    self.emit(StreamEvent::Disconnected).await;
                    return Ok(());
                }
                Err(e) => e,
            };

            metrics::record_stream_error(err.kind());
            self.emit(StreamEvent::Disconnected).await;

            if let StreamError::LoginRejected { code, message } = &err {
                tracing::error!(code = ?code, message = %message, "Realtime login rejected, stopping");
                return Err(err);
            }

            tracing::warn!(error = %err, "Realtime connection lost");

            let Some(delay) = policy.next_delay() else {
                tracing::warn!(
                    attempts = policy.attempts(),
                    "Not reconnecting, prices will go stale"
                );
                return Err(StreamError::ReconnectExhausted {
                    attempts: policy.attempts(),
                });
            };

            let attempt = policy.attempts();
            metrics::record_reconnect();
            tracing::info!(attempt, delay_ms = delay.as_millis(), "Reconnecting to realtime feed");
            self.emit(StreamEvent::Reconnecting { attempt }).await;

            if self.wait_reconnect(delay).await {
                tracing::info!("Tick receiver cancelled during reconnect delay");
                return Ok(());
            }
        }
    }

    /// Sleep for `delay`, still accepting commands. Returns `true` if cancelled.
    async fn wait_reconnect(&mut self, delay: Duration) -> bool {
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => return true,
                () = &mut sleep => return false,
                cmd = self.commands.recv(), if self.commands_open => {
                    match cmd {
                        Some(cmd) => {
                            let _ = self.apply_command(cmd);
                        }
                        None => self.commands_open = false,
                    }
                }
            }
        }
    }

    async fn connect_and_run(&mut self, policy: &mut ReconnectPolicy) -> Result<(), StreamError> {
        tracing::info!(url = %self.config.url, "Connecting to realtime feed");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(&self.config.url).await?;
        let (mut write, mut read) = ws_stream.split();

        let login = self.codec.encode(&LoginRequest::new(self.config.token.as_str()))?;
        write.send(Message::Text(login.into())).await?;

        let mut session = Session::default();
        let login_deadline = tokio::time::sleep(self.config.login_timeout);
        tokio::pin!(login_deadline);

        loop {
            tokio::select! {
                () = self.cancel.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(());
                }
                () = &mut login_deadline, if !session.authenticated => {
                    return Err(StreamError::LoginTimeout(self.config.login_timeout));
                }
                cmd = self.commands.recv(), if self.commands_open => {
                    match cmd {
                        Some(cmd) => {
                            if let Some(frame) = self.apply_command(cmd)
                                && session.authenticated
                            {
                                self.send_registration(&mut write, &frame).await?;
                            }
                        }
                        None => self.commands_open = false,
                    }
                }
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.handle_text(text, &mut write, &mut session, policy).await?;
                        }
                        Some(Ok(Message::Ping(data))) => {
                            write.send(Message::Pong(data)).await?;
                        }
                        Some(Ok(Message::Close(frame))) => {
                            tracing::info!(frame = ?frame, "Server sent close frame");
                            return Err(StreamError::ConnectionClosed);
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => return Err(e.into()),
                        None => return Err(StreamError::ConnectionClosed),
                    }
                }
            }
        }
    }

    async fn handle_text<W>(
        &mut self,
        text: Utf8Bytes,
        write: &mut W,
        session: &mut Session,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError>
    where
        W: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let frame = match self.codec.decode(text.as_str()) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed frame");
                metrics::record_stream_error("malformed_frame");
                return Ok(());
            }
        };

        match frame {
            StreamFrame::Ping => {
                write.send(Message::Text(text)).await?;
                metrics::record_ping_echoed();
                tracing::trace!("Echoed keep-alive");
            }
            StreamFrame::Login(ack) => self.on_login(ack, write, session, policy).await?,
            StreamFrame::Registration(ack) => self.on_registration(&ack).await,
            StreamFrame::Real(real) => {
                let ticks: Vec<Tick> = real.data.iter().filter_map(|e| e.tick()).collect();
                self.record_ticks(ticks, session).await;
            }
            StreamFrame::FlatTick(flat) => {
                self.record_ticks(flat.tick().into_iter().collect(), session)
                    .await;
            }
            StreamFrame::Other(trnm) => {
                tracing::trace!(trnm = %trnm, "Ignoring frame");
            }
        }

        Ok(())
    }

    async fn on_login<W>(
        &mut self,
        ack: LoginAck,
        write: &mut W,
        session: &mut Session,
        policy: &mut ReconnectPolicy,
    ) -> Result<(), StreamError>
    where
        W: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        if !ack.is_success() {
            return Err(StreamError::LoginRejected {
                code: ack.return_code,
                message: ack.return_msg,
            });
        }
        if session.authenticated {
            return Ok(());
        }

        session.authenticated = true;
        policy.reset();
        tracing::info!("Realtime feed authenticated");
        self.emit(StreamEvent::Authenticated).await;

        if !self.subscriptions.is_empty() {
            let codes: Vec<String> = self.subscriptions.iter().cloned().collect();
            let frame = RegistrationRequest::register(
                &self.config.group,
                codes,
                self.config.types.clone(),
            );
            self.send_registration(write, &frame).await?;
        }
        Ok(())
    }

    async fn on_registration(&self, ack: &RegistrationAck) {
        if ack.return_code == Some(0) {
            tracing::debug!(trnm = %ack.trnm, "Registration acknowledged");
        } else {
            tracing::warn!(
                trnm = %ack.trnm,
                code = ?ack.return_code,
                message = %ack.return_msg,
                "Registration rejected"
            );
            metrics::record_stream_error("registration_rejected");
            self.emit(StreamEvent::Error(format!(
                "{} rejected: {}",
                ack.trnm, ack.return_msg
            )))
            .await;
        }
    }

    async fn record_ticks(&self, ticks: Vec<Tick>, session: &mut Session) {
        let mut recorded = false;
        for tick in ticks {
            tracing::trace!(code = %tick.code, price = %tick.price, "Tick");
            if self.writer.record(tick) {
                metrics::record_tick_received();
                recorded = true;
            }
        }

        if recorded && !session.streaming {
            session.streaming = true;
            tracing::info!("Realtime ticks flowing");
            self.emit(StreamEvent::Streaming).await;
        }
    }

    /// Update the subscription set. Returns the frame to send, if any.
    fn apply_command(&mut self, cmd: Command) -> Option<RegistrationRequest> {
        let frame = match cmd {
            Command::Subscribe(codes) => {
                let added: Vec<String> = codes
                    .into_iter()
                    .filter(|c| self.subscriptions.insert(c.clone()))
                    .collect();
                (!added.is_empty()).then(|| {
                    RegistrationRequest::register(
                        &self.config.group,
                        added,
                        self.config.types.clone(),
                    )
                })
            }
            Command::Unsubscribe(codes) => {
                let removed: Vec<String> = codes
                    .into_iter()
                    .filter(|c| self.subscriptions.remove(c))
                    .collect();
                (!removed.is_empty()).then(|| {
                    RegistrationRequest::remove(
                        &self.config.group,
                        removed,
                        self.config.types.clone(),
                    )
                })
            }
        };
        metrics::set_subscriptions(self.subscriptions.len());
        frame
    }

    async fn send_registration<W>(
        &self,
        write: &mut W,
        frame: &RegistrationRequest,
    ) -> Result<(), StreamError>
    where
        W: Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    {
        let codes: Vec<String> = frame.data.iter().flat_map(|d| d.item.clone()).collect();
        let json = self.codec.encode(frame)?;
        tracing::debug!(trnm = frame.trnm, codes = ?codes, "Sending registration");
        write.send(Message::Text(json.into())).await?;

        if frame.trnm == super::messages::TRNM_REG {
            self.emit(StreamEvent::Subscribed { codes }).await;
        }
        Ok(())
    }

    async fn emit(&self, event: StreamEvent) {
        let _ = self.event_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ticks::price_board;

    fn receiver() -> (TickReceiver, TickReceiverHandle) {
        let (writer, _board) = price_board();
        let (event_tx, _event_rx) = mpsc::channel(16);
        TickReceiver::new(
            TickReceiverConfig::new("ws://127.0.0.1:1", AccessToken::new("tok")),
            writer,
            event_tx,
            CancellationToken::new(),
        )
    }

    #[test]
    fn subscribe_registers_only_new_codes() {
        let (mut rx, _handle) = receiver();
        let first = rx
            .apply_command(Command::Subscribe(vec!["005930".into(), "000660".into()]))
            .unwrap();
        assert_eq!(first.data[0].item, vec!["005930", "000660"]);

        let second = rx.apply_command(Command::Subscribe(vec!["005930".into(), "035420".into()]));
        assert_eq!(second.unwrap().data[0].item, vec!["035420"]);

        assert!(
            rx.apply_command(Command::Subscribe(vec!["005930".into()]))
                .is_none()
        );
    }

    #[test]
    fn unsubscribe_removes_known_codes() {
        let (mut rx, _handle) = receiver();
        let _ = rx.apply_command(Command::Subscribe(vec!["005930".into()]));

        let frame = rx
            .apply_command(Command::Unsubscribe(vec!["005930".into(), "999999".into()]))
            .unwrap();
        assert_eq!(frame.trnm, "REMOVE");
        assert_eq!(frame.data[0].item, vec!["005930"]);
        assert!(rx.subscriptions.is_empty());
    }

    #[test]
    fn events_map_to_states() {
        assert_eq!(StreamEvent::Connecting.state(), Some(StreamState::Connecting));
        assert_eq!(
            StreamEvent::Reconnecting { attempt: 2 }.state(),
            Some(StreamState::Disconnected)
        );
        assert_eq!(StreamEvent::Error("x".into()).state(), None);
        assert_eq!(StreamState::Streaming.to_string(), "streaming");
    }

    #[tokio::test]
    async fn handle_reports_stopped_receiver() {
        let (rx, handle) = receiver();
        drop(rx);
        assert!(handle.is_closed());
        assert!(matches!(
            handle.subscribe(vec!["005930".into()]).await,
            Err(SubscriptionError::FeedStopped)
        ));
    }

    #[tokio::test]
    async fn unreachable_server_without_reconnect_gives_up() {
        let (writer, _board) = price_board();
        let (event_tx, mut event_rx) = mpsc::channel(16);
        let config = TickReceiverConfig::new("ws://127.0.0.1:9", AccessToken::new("tok"))
            .with_reconnect(ReconnectConfig::disabled());
        let (rx, _handle) = TickReceiver::new(config, writer, event_tx, CancellationToken::new());

        let result = rx.run().await;
        assert!(matches!(
            result,
            Err(StreamError::ReconnectExhausted { attempts: 0 })
        ));
        assert_eq!(event_rx.recv().await, Some(StreamEvent::Connecting));
        assert_eq!(event_rx.recv().await, Some(StreamEvent::Disconnected));
    }
}
