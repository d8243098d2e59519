use crate::core::config::{ChannelConfig, CredentialProvider, Credentials};
use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{
    ChannelStatus, Opened, Session, SessionEvent, SessionSignal, WsTransport,
};
use crate::core::types::{OrderRoute, TradeOrderRequest, TradeOrderResult};
use crate::exchanges::binance_perp::codec::{
    decode_trading_response, encode_trading_request, trading_keepalive, KEEPALIVE_ID,
};
use crate::exchanges::binance_perp::conversions::{
    cancel_params, classify_api_error, convert_order_response, order_params,
};
use crate::exchanges::binance_perp::signer::sign_ws_params;
use crate::exchanges::binance_perp::types::{
    BinancePerpOrderResponse, BinancePerpWsRequest, BinancePerpWsResponse,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{timeout, Instant};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

const PLACE_ORDER: &str = "order.place";
const CANCEL_ORDER: &str = "order.cancel";

type Reply<T> = oneshot::Sender<Result<T, ExchangeError>>;

enum Command {
    Connect {
        reply: Reply<()>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Request {
        id: String,
        method: &'static str,
        params: BTreeMap<String, String>,
        reply: Reply<Value>,
    },
    /// Caller gave up waiting; drop the entry if it is still there
    Abandon {
        id: String,
    },
    PendingCount {
        reply: oneshot::Sender<usize>,
    },
}

struct PendingRequest {
    method: &'static str,
    issued_at: Instant,
    reply: Reply<Value>,
}

/// Signed order entry over the futures WebSocket API.
///
/// Cheap to clone; every clone talks to the same driver task, which owns the
/// socket and the map of in-flight requests. The task stops once all handles
/// are dropped.
#[derive(Clone)]
pub struct TradingChannel {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    request_timeout: Duration,
}

impl TradingChannel {
    pub fn spawn(
        transport: Arc<dyn WsTransport>,
        credentials: Arc<dyn CredentialProvider>,
        config: &ChannelConfig,
    ) -> Self {
        let (session, status) = Session::new("trading", transport, config, trading_keepalive());
        let (tx, rx) = mpsc::unbounded_channel();

        let driver = TradingDriver {
            commands: rx,
            session,
            provider: credentials,
            credentials: None,
            pending: HashMap::new(),
            recv_window: config.recv_window,
        };
        tokio::spawn(driver.run());

        Self {
            commands: tx,
            status,
            request_timeout: config.request_timeout,
        }
    }

    /// Fetch credentials and open the socket. Fails with `AuthError` when no
    /// credentials are available, `TransportError` when the socket does not
    /// open in time.
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect { reply: tx })?;
        rx.await.map_err(|_| stopped())?
    }

    /// Close the socket and fail every in-flight request. No reconnection
    /// follows.
    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Disconnect { reply: tx }).is_ok() {
            let _ = rx.await;
        }
    }

    #[instrument(skip(self, order), fields(exchange = "binance_perp", symbol = %order.symbol()))]
    pub async fn place_order(
        &self,
        order: &TradeOrderRequest,
    ) -> Result<TradeOrderResult, ExchangeError> {
        let result = self.request(PLACE_ORDER, order_params(order)).await?;
        let response: BinancePerpOrderResponse = serde_json::from_value(result)?;
        Ok(convert_order_response(response, OrderRoute::WebSocket))
    }

    #[instrument(skip(self), fields(exchange = "binance_perp", symbol = %symbol))]
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: u64,
    ) -> Result<TradeOrderResult, ExchangeError> {
        let result = self
            .request(CANCEL_ORDER, cancel_params(symbol, order_id))
            .await?;
        let response: BinancePerpOrderResponse = serde_json::from_value(result)?;
        Ok(convert_order_response(response, OrderRoute::WebSocket))
    }

    /// Number of requests waiting for a response
    pub async fn pending_requests(&self) -> usize {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::PendingCount { reply: tx }).is_err() {
            return 0;
        }
        rx.await.unwrap_or_default()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    pub fn status_watch(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    async fn request(
        &self,
        method: &'static str,
        params: BTreeMap<String, String>,
    ) -> Result<Value, ExchangeError> {
        let id = Uuid::new_v4().simple().to_string();
        let (tx, rx) = oneshot::channel();
        self.send(Command::Request {
            id: id.clone(),
            method,
            params,
            reply: tx,
        })?;

        match timeout(self.request_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(stopped()),
            Err(_) => {
                let _ = self.commands.send(Command::Abandon { id });
                warn!(method, timeout = ?self.request_timeout, "request timed out");
                Err(ExchangeError::TransportError(format!(
                    "{} timed out after {:?}",
                    method, self.request_timeout
                )))
            }
        }
    }

    fn send(&self, command: Command) -> Result<(), ExchangeError> {
        self.commands.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> ExchangeError {
    ExchangeError::TransportError("trading channel task stopped".to_string())
}

enum Event {
    Command(Option<Command>),
    Session(SessionSignal),
}

struct TradingDriver {
    commands: mpsc::UnboundedReceiver<Command>,
    session: Session,
    provider: Arc<dyn CredentialProvider>,
    credentials: Option<Credentials>,
    pending: HashMap<String, PendingRequest>,
    recv_window: Option<u64>,
}

impl TradingDriver {
    async fn run(mut self) {
        loop {
            let event = tokio::select! {
                command = self.commands.recv() => Event::Command(command),
                signal = self.session.wait() => Event::Session(signal),
            };

            match event {
                Event::Command(Some(command)) => self.on_command(command).await,
                Event::Command(None) => break,
                Event::Session(signal) => {
                    if let Some(event) = self.session.handle(signal).await {
                        self.on_session_event(event);
                    }
                }
            }
        }

        self.session.close().await;
        self.fail_pending("trading channel shut down");
        debug!("trading driver stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                let _ = reply.send(self.connect().await);
            }
            Command::Disconnect { reply } => {
                self.session.close().await;
                self.fail_pending("trading channel disconnected");
                info!("trading channel disconnected");
                let _ = reply.send(());
            }
            Command::Request {
                id,
                method,
                params,
                reply,
            } => self.dispatch(id, method, params, reply).await,
            Command::Abandon { id } => {
                if self.pending.remove(&id).is_some() {
                    debug!(%id, "abandoned request dropped");
                }
            }
            Command::PendingCount { reply } => {
                let _ = reply.send(self.pending.len());
            }
        }
    }

    async fn connect(&mut self) -> Result<(), ExchangeError> {
        let credentials = self.provider.get_credentials().ok_or_else(|| {
            ExchangeError::AuthError("API credentials are not configured".to_string())
        })?;
        self.credentials = Some(credentials);
        if let Some(event) = self.session.retire_broken() {
            self.on_session_event(event);
        }
        if self.session.open().await? == Opened::Fresh {
            info!("trading channel connected");
        }
        Ok(())
    }

    async fn dispatch(
        &mut self,
        id: String,
        method: &'static str,
        params: BTreeMap<String, String>,
        reply: Reply<Value>,
    ) {
        if !self.session.is_open() {
            let _ = reply.send(Err(ExchangeError::TransportError(
                "trading channel is not connected".to_string(),
            )));
            return;
        }
        let Some(credentials) = self.credentials.as_ref() else {
            let _ = reply.send(Err(ExchangeError::AuthError(
                "API credentials are not configured".to_string(),
            )));
            return;
        };

        let timestamp = chrono::Utc::now().timestamp_millis();
        let frame = sign_ws_params(params, credentials, timestamp, self.recv_window).and_then(
            |params| {
                encode_trading_request(&BinancePerpWsRequest {
                    id: id.clone(),
                    method: method.to_string(),
                    params,
                })
            },
        );
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        self.pending.insert(
            id.clone(),
            PendingRequest {
                method,
                issued_at: Instant::now(),
                reply,
            },
        );
        trace!(%id, method, "request sent");

        if let Err(e) = self.session.send(frame).await {
            if let Some(pending) = self.pending.remove(&id) {
                let _ = pending.reply.send(Err(e));
            }
        }
    }

    fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame(msg) => self.on_frame(msg),
            SessionEvent::Lost { reason, will_retry } => {
                self.fail_pending(&reason);
                if !will_retry {
                    error!(%reason, "trading channel down, reconnection exhausted");
                }
            }
            SessionEvent::Reconnected => match self.provider.get_credentials() {
                Some(credentials) => self.credentials = Some(credentials),
                None => warn!("credentials unavailable after reconnect, keeping previous"),
            },
            SessionEvent::ReconnectFailed { reason, will_retry } => {
                if !will_retry {
                    error!(%reason, "trading channel reconnection exhausted");
                }
            }
        }
    }

    fn on_frame(&mut self, msg: Message) {
        let response = match decode_trading_response(msg) {
            Ok(Some(response)) => response,
            Ok(None) => return,
            Err(e) => {
                warn!(error = %e, "dropping undecodable trading frame");
                return;
            }
        };

        let Some(id) = response.id.clone() else {
            debug!("trading frame without id ignored");
            return;
        };
        if id == KEEPALIVE_ID || id == "pong" {
            trace!("keepalive acknowledged");
            return;
        }
        let Some(pending) = self.pending.remove(&id) else {
            debug!(%id, "no pending request for response");
            return;
        };

        debug!(
            %id,
            method = pending.method,
            elapsed = ?pending.issued_at.elapsed(),
            status = ?response.status,
            "response matched"
        );
        let _ = pending.reply.send(into_result(response));
    }

    fn fail_pending(&mut self, reason: &str) {
        if self.pending.is_empty() {
            return;
        }
        warn!(count = self.pending.len(), %reason, "failing in-flight requests");
        for (_, pending) in self.pending.drain() {
            let _ = pending.reply.send(Err(ExchangeError::TransportError(format!(
                "connection closed before {} completed: {}",
                pending.method, reason
            ))));
        }
    }
}

fn into_result(response: BinancePerpWsResponse) -> Result<Value, ExchangeError> {
    if response.status == Some(200) {
        return Ok(response.result.unwrap_or(Value::Null));
    }
    match response.error {
        Some(error) => Err(classify_api_error(error.code, &error.msg)),
        None => Err(ExchangeError::GenericClientError(format!(
            "request failed with status {:?}",
            response.status
        ))),
    }
}
