use crate::core::config::ChannelConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::backoff::Backoff;
use crate::core::kernel::keepalive::KeepAliveTimer;
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Sleep};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, error, info, instrument, trace, warn};

/// Outbound half of an open socket
pub type WsSink = Pin<Box<dyn Sink<Message, Error = ExchangeError> + Send>>;
/// Inbound half of an open socket
pub type WsStream = Pin<Box<dyn Stream<Item = Result<Message, ExchangeError>> + Send>>;

/// An open duplex socket, split into its two halves.
pub struct WsLink {
    pub sink: WsSink,
    pub stream: WsStream,
}

/// Opens sockets to one endpoint - pure transport, no protocol knowledge.
#[async_trait]
pub trait WsTransport: Send + Sync + 'static {
    /// Open a new socket. Each call yields an independent connection.
    async fn open(&self) -> Result<WsLink, ExchangeError>;

    /// Endpoint this transport dials, for logging
    fn endpoint(&self) -> &str;
}

/// Tungstenite-based WebSocket transport
pub struct TungsteniteWs {
    url: String,
    exchange_name: String,
}

impl TungsteniteWs {
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to
    /// * `exchange_name` - Name of the exchange for logging/tracing
    pub fn new(url: String, exchange_name: String) -> Self {
        Self { url, exchange_name }
    }
}

#[async_trait]
impl WsTransport for TungsteniteWs {
    #[instrument(skip(self), fields(exchange = %self.exchange_name, url = %self.url))]
    async fn open(&self) -> Result<WsLink, ExchangeError> {
        let (ws_stream, _) = connect_async(&self.url).await.map_err(|e| {
            ExchangeError::TransportError(format!("WebSocket connection failed: {}", e))
        })?;

        let (write, read) = ws_stream.split();
        let sink = write.sink_map_err(|e| {
            ExchangeError::TransportError(format!("Failed to send WebSocket message: {}", e))
        });
        let stream = read.map(|frame| {
            frame.map_err(|e| ExchangeError::TransportError(format!("WebSocket error: {}", e)))
        });

        Ok(WsLink {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }

    fn endpoint(&self) -> &str {
        &self.url
    }
}

/// Channel-level lifecycle as seen by callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Disconnected,
    Connecting,
    Connected,
}

/// Snapshot published on every lifecycle transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelStatus {
    pub state: ChannelState,
    /// Automatic reconnect attempts since the last successful open
    pub reconnect_attempt: u32,
    /// Set when automatic reconnection gave up; cleared by an explicit connect
    pub fatal: Option<String>,
}

impl Default for ChannelStatus {
    fn default() -> Self {
        Self {
            state: ChannelState::Disconnected,
            reconnect_attempt: 0,
            fatal: None,
        }
    }
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        self.state == ChannelState::Connected
    }
}

/// Lifecycle of one socket. A connection is never reopened; reconnecting
/// replaces it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Open,
    Closing,
    Closed,
}

struct Connection {
    sink: WsSink,
    stream: WsStream,
    state: ConnectionState,
    keepalive: KeepAliveTimer,
    broken: Option<String>,
}

/// What an explicit [`Session::open`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    /// A socket was already open and is kept
    Existing,
    /// A new socket was established
    Fresh,
}

/// Raw wake-up reasons produced by [`Session::wait`]
#[derive(Debug)]
pub enum SessionSignal {
    Frame(Message),
    Ping(Vec<u8>),
    KeepAlive(Message),
    Lost(String),
    ReconnectDue,
}

/// Lifecycle events a channel driver has to react to
#[derive(Debug)]
pub enum SessionEvent {
    /// Text or binary data frame
    Frame(Message),
    /// The socket went away. Work bound to it must be failed.
    Lost { reason: String, will_retry: bool },
    /// Automatic reconnection succeeded
    Reconnected,
    /// An automatic reconnect attempt failed
    ReconnectFailed { reason: String, will_retry: bool },
}

/// Owns the socket of one channel: connect timeout, keepalive, and automatic
/// reconnection with backoff. Protocol handling stays in the channel driver.
///
/// Drivers call [`Session::wait`] inside `select!` (it is cancel safe) and feed
/// the result to [`Session::handle`], which must run to completion.
pub struct Session {
    name: &'static str,
    transport: Arc<dyn WsTransport>,
    connect_timeout: Duration,
    keepalive_interval: Duration,
    keepalive_frame: Message,
    max_reconnect_attempts: u32,
    connection: Option<Connection>,
    backoff: Backoff,
    reconnect_at: Option<Pin<Box<Sleep>>>,
    user_closed: bool,
    status: watch::Sender<ChannelStatus>,
}

impl Session {
    pub fn new(
        name: &'static str,
        transport: Arc<dyn WsTransport>,
        config: &ChannelConfig,
        keepalive_frame: Message,
    ) -> (Self, watch::Receiver<ChannelStatus>) {
        let (status, status_rx) = watch::channel(ChannelStatus::default());
        let session = Self {
            name,
            transport,
            connect_timeout: config.connect_timeout,
            keepalive_interval: config.keepalive_interval,
            keepalive_frame,
            max_reconnect_attempts: config.max_reconnect_attempts,
            connection: None,
            backoff: Backoff::new(
                config.reconnect_base_delay,
                config.max_reconnect_attempts,
                config.reconnect_jitter,
            ),
            reconnect_at: None,
            user_closed: true,
            status,
        };
        (session, status_rx)
    }

    pub fn is_open(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.state == ConnectionState::Open)
    }

    /// Explicit connect. Cancels any scheduled reconnect and clears a previous
    /// fatal state.
    ///
    /// A connection that broke but has not been reported yet must be handed
    /// back through [`Session::retire_broken`] first.
    #[instrument(skip(self), fields(channel = self.name, endpoint = %self.transport.endpoint()))]
    pub async fn open(&mut self) -> Result<Opened, ExchangeError> {
        if self.is_open() {
            return Ok(Opened::Existing);
        }
        if self.connection.take().is_some() {
            warn!(channel = self.name, "replacing a broken connection that was never retired");
        }

        self.user_closed = false;
        self.reconnect_at = None;
        self.backoff.reset();
        self.status.send_modify(|s| {
            s.fatal = None;
            s.reconnect_attempt = 0;
        });

        self.establish().await?;
        Ok(Opened::Fresh)
    }

    /// Drop a connection that is no longer usable and report its loss, so
    /// work bound to it can be failed before an explicit open replaces it.
    /// No reconnect is scheduled.
    pub fn retire_broken(&mut self) -> Option<SessionEvent> {
        let conn = self.connection.as_ref()?;
        if conn.state == ConnectionState::Open {
            return None;
        }
        let reason = conn
            .broken
            .clone()
            .unwrap_or_else(|| "connection closing".to_string());
        self.drop_connection(&reason);
        // the caller is about to reopen
        Some(SessionEvent::Lost {
            reason,
            will_retry: true,
        })
    }

    /// Explicit disconnect. No automatic reconnection follows.
    #[instrument(skip(self), fields(channel = self.name))]
    pub async fn close(&mut self) {
        self.user_closed = true;
        self.reconnect_at = None;
        self.backoff.reset();

        if let Some(mut conn) = self.connection.take() {
            conn.state = ConnectionState::Closing;
            let _ = conn.sink.send(Message::Close(None)).await;
            let _ = conn.sink.close().await;
            conn.state = ConnectionState::Closed;
            debug!(channel = self.name, "socket closed");
        }

        self.status.send_modify(|s| {
            s.state = ChannelState::Disconnected;
            s.reconnect_attempt = 0;
            s.fatal = None;
        });
    }

    /// Send one frame. A failed send marks the connection broken; the loss is
    /// reported by the next [`Session::wait`].
    pub async fn send(&mut self, msg: Message) -> Result<(), ExchangeError> {
        let name = self.name;
        let conn = match self.connection.as_mut() {
            Some(conn) if conn.state == ConnectionState::Open => conn,
            _ => {
                return Err(ExchangeError::TransportError(format!(
                    "{} channel is not connected",
                    name
                )))
            }
        };

        if let Err(e) = conn.sink.send(msg).await {
            warn!(channel = name, error = %e, "send failed, marking connection broken");
            conn.state = ConnectionState::Closing;
            conn.broken = Some(e.to_string());
            return Err(e);
        }
        Ok(())
    }

    /// Wait for the next thing that needs attention. Cancel safe.
    pub async fn wait(&mut self) -> SessionSignal {
        match (&mut self.connection, &mut self.reconnect_at) {
            (Some(conn), _) => {
                if conn.state != ConnectionState::Open {
                    let reason = conn
                        .broken
                        .clone()
                        .unwrap_or_else(|| "connection closing".to_string());
                    return SessionSignal::Lost(reason);
                }
                loop {
                    tokio::select! {
                        frame = conn.stream.next() => match frame {
                            Some(Ok(Message::Ping(data))) => return SessionSignal::Ping(data),
                            Some(Ok(Message::Pong(_) | Message::Frame(_))) => continue,
                            Some(Ok(Message::Close(frame))) => {
                                let reason = frame.map_or_else(
                                    || "closed by peer".to_string(),
                                    |f| format!("closed by peer: {} {}", f.code, f.reason),
                                );
                                return SessionSignal::Lost(reason);
                            }
                            Some(Ok(msg)) => return SessionSignal::Frame(msg),
                            Some(Err(e)) => return SessionSignal::Lost(e.to_string()),
                            None => return SessionSignal::Lost("stream ended".to_string()),
                        },
                        frame = conn.keepalive.tick() => return SessionSignal::KeepAlive(frame),
                    }
                }
            }
            (None, Some(delay)) => {
                delay.as_mut().await;
                SessionSignal::ReconnectDue
            }
            (None, None) => std::future::pending().await,
        }
    }

    /// Act on a signal from [`Session::wait`].
    pub async fn handle(&mut self, signal: SessionSignal) -> Option<SessionEvent> {
        match signal {
            SessionSignal::Frame(msg) => Some(SessionEvent::Frame(msg)),
            SessionSignal::Ping(data) => {
                // failure surfaces through the next wait()
                let _ = self.send(Message::Pong(data)).await;
                None
            }
            SessionSignal::KeepAlive(frame) => {
                trace!(channel = self.name, "sending keepalive");
                let _ = self.send(frame).await;
                None
            }
            SessionSignal::Lost(reason) => Some(self.lose(reason)),
            SessionSignal::ReconnectDue => {
                self.reconnect_at = None;
                match self.establish().await {
                    Ok(()) => {
                        info!(channel = self.name, "reconnected");
                        Some(SessionEvent::Reconnected)
                    }
                    Err(e) => {
                        warn!(channel = self.name, error = %e, "reconnect attempt failed");
                        let will_retry = self.schedule_reconnect();
                        Some(SessionEvent::ReconnectFailed {
                            reason: e.to_string(),
                            will_retry,
                        })
                    }
                }
            }
        }
    }

    async fn establish(&mut self) -> Result<(), ExchangeError> {
        self.status
            .send_modify(|s| s.state = ChannelState::Connecting);

        let opened = timeout(self.connect_timeout, self.transport.open()).await;
        let link = match opened {
            Ok(Ok(link)) => link,
            Ok(Err(e)) => {
                self.status
                    .send_modify(|s| s.state = ChannelState::Disconnected);
                return Err(e);
            }
            Err(_) => {
                self.status
                    .send_modify(|s| s.state = ChannelState::Disconnected);
                return Err(ExchangeError::TransportError(format!(
                    "{} channel connection timeout after {:?}",
                    self.name, self.connect_timeout
                )));
            }
        };

        self.connection = Some(Connection {
            sink: link.sink,
            stream: link.stream,
            state: ConnectionState::Open,
            keepalive: KeepAliveTimer::start(self.keepalive_interval, self.keepalive_frame.clone()),
            broken: None,
        });
        self.backoff.reset();
        self.status.send_modify(|s| {
            s.state = ChannelState::Connected;
            s.reconnect_attempt = 0;
            s.fatal = None;
        });
        debug!(channel = self.name, "socket open");
        Ok(())
    }

    fn drop_connection(&mut self, reason: &str) {
        if let Some(mut conn) = self.connection.take() {
            conn.state = ConnectionState::Closed;
        }
        self.status
            .send_modify(|s| s.state = ChannelState::Disconnected);
        warn!(channel = self.name, %reason, "connection lost");
    }

    fn lose(&mut self, reason: String) -> SessionEvent {
        self.drop_connection(&reason);
        let will_retry = !self.user_closed && self.schedule_reconnect();
        SessionEvent::Lost { reason, will_retry }
    }

    fn schedule_reconnect(&mut self) -> bool {
        if let Some(delay) = self.backoff.next_delay() {
            let attempt = self.backoff.attempt();
            info!(channel = self.name, attempt, ?delay, "scheduling reconnect");
            self.reconnect_at = Some(Box::pin(sleep(delay)));
            self.status.send_modify(|s| s.reconnect_attempt = attempt);
            true
        } else {
            let reason = format!(
                "{} channel gave up after {} reconnect attempts",
                self.name, self.max_reconnect_attempts
            );
            error!(channel = self.name, "{}", reason);
            self.status.send_modify(|s| {
                s.state = ChannelState::Disconnected;
                s.fatal = Some(reason);
            });
            false
        }
    }
}
