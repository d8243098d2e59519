use crate::core::config::ChannelConfig;
use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{
    ChannelStatus, Opened, Session, SessionEvent, SessionSignal, WsTransport,
};
use crate::core::kernel::WsCodec;
use crate::exchanges::binance_perp::codec::{BinancePerpCodec, BinancePerpMessage, MarketEvent};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, instrument, trace, warn};

const EVENT_BUFFER: usize = 1024;

type Reply<T> = oneshot::Sender<Result<T, ExchangeError>>;

enum Command {
    Connect { reply: Reply<()> },
    Disconnect { reply: oneshot::Sender<()> },
    Subscribe { streams: Vec<String>, reply: Reply<()> },
    Unsubscribe { streams: Vec<String>, reply: Reply<()> },
    List { reply: oneshot::Sender<BTreeSet<String>> },
}

/// Public market streams with a subscription set that survives reconnects.
#[derive(Clone)]
pub struct MarketDataChannel {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ChannelStatus>,
    events: broadcast::Sender<MarketEvent>,
}

impl MarketDataChannel {
    pub fn spawn(transport: Arc<dyn WsTransport>, config: &ChannelConfig) -> Self {
        let (session, status) =
            Session::new("market_data", transport, config, Message::Ping(Vec::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let driver = MarketDriver {
            commands: rx,
            session,
            codec: BinancePerpCodec,
            subscriptions: BTreeSet::new(),
            max_streams: config.max_streams,
            next_id: 0,
            events: events.clone(),
        };
        tokio::spawn(driver.run());

        Self {
            commands: tx,
            status,
            events,
        }
    }

    pub async fn connect(&self) -> Result<(), ExchangeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Connect { reply: tx })?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn disconnect(&self) {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::Disconnect { reply: tx }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Add streams to the subscription set.
    ///
    /// Fails with `ValidationError` (set untouched) when the result would
    /// exceed the stream cap. While disconnected the streams are recorded and
    /// `TransportError` is returned; they are subscribed on the next connect.
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn subscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Subscribe { streams, reply: tx })?;
        rx.await.map_err(|_| stopped())?
    }

    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn unsubscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Unsubscribe { streams, reply: tx })?;
        rx.await.map_err(|_| stopped())?
    }

    pub async fn list_active_subscriptions(&self) -> BTreeSet<String> {
        let (tx, rx) = oneshot::channel();
        if self.send(Command::List { reply: tx }).is_err() {
            return BTreeSet::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Decoded stream events. Slow receivers lag rather than block the socket.
    pub fn events(&self) -> broadcast::Receiver<MarketEvent> {
        self.events.subscribe()
    }

    pub fn status(&self) -> ChannelStatus {
        self.status.borrow().clone()
    }

    pub fn status_watch(&self) -> watch::Receiver<ChannelStatus> {
        self.status.clone()
    }

    fn send(&self, command: Command) -> Result<(), ExchangeError> {
        self.commands.send(command).map_err(|_| stopped())
    }
}

fn stopped() -> ExchangeError {
    ExchangeError::TransportError("market data channel task stopped".to_string())
}

fn not_connected() -> ExchangeError {
    ExchangeError::TransportError(
        "market data channel is not connected; streams apply on next connect".to_string(),
    )
}

enum Event {
    Command(Option<Command>),
    Session(SessionSignal),
}

struct MarketDriver {
    commands: mpsc::UnboundedReceiver<Command>,
    session: Session,
    codec: BinancePerpCodec,
    subscriptions: BTreeSet<String>,
    max_streams: usize,
    next_id: u64,
    events: broadcast::Sender<MarketEvent>,
}

impl MarketDriver {
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
                        self.on_session_event(event).await;
                    }
                }
            }
        }

        self.session.close().await;
        debug!("market data driver stopped");
    }

    async fn on_command(&mut self, command: Command) {
        match command {
            Command::Connect { reply } => {
                if let Some(event) = self.session.retire_broken() {
                    self.on_session_event(event).await;
                }
                let result = self.session.open().await;
                if let Ok(Opened::Fresh) = result {
                    info!(streams = self.subscriptions.len(), "market data channel connected");
                    self.resubscribe().await;
                }
                let _ = reply.send(result.map(|_| ()));
            }
            Command::Disconnect { reply } => {
                self.session.close().await;
                info!("market data channel disconnected");
                let _ = reply.send(());
            }
            Command::Subscribe { streams, reply } => {
                let _ = reply.send(self.subscribe(streams).await);
            }
            Command::Unsubscribe { streams, reply } => {
                let _ = reply.send(self.unsubscribe(streams).await);
            }
            Command::List { reply } => {
                let _ = reply.send(self.subscriptions.clone());
            }
        }
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    async fn subscribe(&mut self, streams: Vec<String>) -> Result<(), ExchangeError> {
        let requested = normalize(streams)?;
        let total = self.subscriptions.union(&requested).count();
        if total > self.max_streams {
            return Err(ExchangeError::ValidationError(format!(
                "Subscription would track {} streams, maximum is {}",
                total, self.max_streams
            )));
        }

        self.subscriptions.extend(requested.iter().cloned());
        if !self.session.is_open() {
            return Err(not_connected());
        }

        let requested: Vec<String> = requested.into_iter().collect();
        let id = self.next_id();
        let frame = self.codec.encode_subscription(&requested, id)?;
        debug!(id, streams = ?requested, "subscribing");
        self.session.send(frame).await
    }

    async fn unsubscribe(&mut self, streams: Vec<String>) -> Result<(), ExchangeError> {
        let requested = normalize(streams)?;
        for stream in &requested {
            self.subscriptions.remove(stream);
        }
        if !self.session.is_open() {
            return Err(not_connected());
        }

        let requested: Vec<String> = requested.into_iter().collect();
        let id = self.next_id();
        let frame = self.codec.encode_unsubscription(&requested, id)?;
        debug!(id, streams = ?requested, "unsubscribing");
        self.session.send(frame).await
    }

    /// One SUBSCRIBE frame carrying the whole set
    async fn resubscribe(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        let streams: Vec<String> = self.subscriptions.iter().cloned().collect();
        let id = self.next_id();
        let sent = match self.codec.encode_subscription(&streams, id) {
            Ok(frame) => self.session.send(frame).await,
            Err(e) => Err(e),
        };
        match sent {
            Ok(()) => info!(id, count = streams.len(), "resubscribed"),
            Err(e) => warn!(error = %e, "resubscribe failed"),
        }
    }

    async fn on_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Frame(msg) => self.on_frame(msg),
            SessionEvent::Reconnected => self.resubscribe().await,
            SessionEvent::Lost { reason, will_retry }
            | SessionEvent::ReconnectFailed { reason, will_retry } => {
                if !will_retry {
                    error!(%reason, "market data channel reconnection exhausted");
                }
            }
        }
    }

    fn on_frame(&mut self, msg: Message) {
        match self.codec.decode_message(msg) {
            Ok(Some(BinancePerpMessage::Event(event))) => {
                // no receivers is fine
                let _ = self.events.send(event);
            }
            Ok(Some(BinancePerpMessage::Ack { id })) => debug!(id, "subscription acknowledged"),
            Ok(Some(BinancePerpMessage::ControlError { id, code, msg })) => {
                warn!(?id, code, %msg, "subscription request rejected");
            }
            Ok(None) => trace!("ignoring unrecognised market frame"),
            Err(e) => warn!(error = %e, "dropping undecodable market frame"),
        }
    }
}

fn normalize(streams: Vec<String>) -> Result<BTreeSet<String>, ExchangeError> {
    let set: BTreeSet<String> = streams
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect();
    if set.iter().any(String::is_empty) {
        return Err(ExchangeError::ValidationError(
            "Stream names must not be empty".to_string(),
        ));
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::kernel::testing::{mock_transport, MockPeer, MockServer};
    use serde_json::json;

    fn names(range: std::ops::Range<usize>) -> Vec<String> {
        range.map(|n| format!("sym{}usdt@aggTrade", n)).collect()
    }

    async fn connected() -> (MarketDataChannel, MockServer, MockPeer) {
        let (transport, mut server) = mock_transport();
        let channel = MarketDataChannel::spawn(transport, &ChannelConfig::default());
        channel.connect().await.unwrap();
        let peer = server.accept().await;
        (channel, server, peer)
    }

    #[tokio::test(start_paused = true)]
    async fn test_resubscribe_after_reconnect_sends_current_set_once() {
        let (channel, mut server, mut peer) = connected().await;

        channel
            .subscribe(vec!["btcusdt@bookTicker".into(), "ethusdt@aggTrade".into()])
            .await
            .unwrap();
        let frame = peer.recv_json().await;
        assert_eq!(frame["method"], "SUBSCRIBE");

        channel
            .unsubscribe(vec!["btcusdt@bookTicker".into()])
            .await
            .unwrap();
        assert_eq!(peer.recv_json().await["method"], "UNSUBSCRIBE");
        channel
            .subscribe(vec!["solusdt@markPrice".into()])
            .await
            .unwrap();
        peer.recv_json().await;

        drop(peer);
        let mut peer = server.accept().await;
        let frame = peer.recv_json().await;
        assert_eq!(frame["method"], "SUBSCRIBE");
        assert_eq!(frame["params"], json!(["ethusdt@aggTrade", "solusdt@markPrice"]));

        // round trip through the driver so any further frame would be queued
        assert_eq!(channel.list_active_subscriptions().await.len(), 2);
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_changes_during_outage_are_replayed_as_one_frame() {
        let (channel, mut server, mut peer) = connected().await;

        channel
            .subscribe(vec!["btcusdt@bookTicker".into(), "ethusdt@aggTrade".into()])
            .await
            .unwrap();
        peer.recv_json().await;

        drop(peer);
        channel
            .status_watch()
            .wait_for(|s| !s.is_connected())
            .await
            .unwrap();

        // the reconnect is a second away; both changes land before it
        let err = channel
            .subscribe(vec!["solusdt@markPrice".into()])
            .await
            .unwrap_err();
        assert!(err.is_transport());
        let err = channel
            .unsubscribe(vec!["btcusdt@bookTicker".into()])
            .await
            .unwrap_err();
        assert!(err.is_transport());

        let mut peer = server.accept().await;
        let frame = peer.recv_json().await;
        assert_eq!(frame["method"], "SUBSCRIBE");
        assert_eq!(frame["params"], json!(["ethusdt@aggTrade", "solusdt@markPrice"]));

        assert_eq!(channel.list_active_subscriptions().await.len(), 2);
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_second_connect_does_not_resubscribe() {
        let (channel, server, mut peer) = connected().await;

        channel
            .subscribe(vec!["btcusdt@bookTicker".into()])
            .await
            .unwrap();
        peer.recv_json().await;

        channel.connect().await.unwrap();
        assert_eq!(channel.list_active_subscriptions().await.len(), 1);
        assert!(peer.outbound.try_recv().is_err());
        assert_eq!(server.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_stream_cap_rejects_without_mutation() {
        let (channel, _server, mut peer) = connected().await;

        channel.subscribe(names(0..200)).await.unwrap();
        peer.recv_json().await;

        let err = channel.subscribe(names(200..201)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ValidationError(_)));
        let active = channel.list_active_subscriptions().await;
        assert_eq!(active.len(), 200);
        assert!(!active.contains("sym200usdt@aggTrade"));

        // already-tracked streams do not count twice
        channel.subscribe(names(0..10)).await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let (transport, _server) = mock_transport();
        let channel = MarketDataChannel::spawn(transport, &ChannelConfig::default());

        let err = channel.subscribe(names(0..201)).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ValidationError(_)));
        assert!(channel.list_active_subscriptions().await.is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_while_disconnected_is_replayed_on_connect() {
        let (transport, mut server) = mock_transport();
        let channel = MarketDataChannel::spawn(transport, &ChannelConfig::default());

        let err = channel
            .subscribe(vec!["btcusdt@bookTicker".into()])
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert!(channel
            .list_active_subscriptions()
            .await
            .contains("btcusdt@bookTicker"));

        channel.connect().await.unwrap();
        let mut peer = server.accept().await;
        let frame = peer.recv_json().await;
        assert_eq!(frame["params"], json!(["btcusdt@bookTicker"]));
    }

    #[tokio::test]
    async fn test_empty_set_sends_nothing_on_connect() {
        let (channel, _server, mut peer) = connected().await;
        assert!(channel.list_active_subscriptions().await.is_empty());
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_events_routed_and_unknown_ignored() {
        let (channel, _server, mut peer) = connected().await;
        let mut events = channel.events();

        peer.send_json(json!({"result": null, "id": 1}));
        peer.send_json(json!({"e": "forceOrder", "E": 1, "o": {}}));
        peer.send_json(json!({
            "stream": "btcusdt@aggTrade",
            "data": {
                "e": "aggTrade", "E": 123456789, "s": "BTCUSDT", "a": 5933014,
                "p": "0.001", "q": "100", "f": 100, "l": 105, "T": 123456785, "m": true
            }
        }));

        match events.recv().await.unwrap() {
            MarketEvent::AggTrade(trade) => {
                assert_eq!(trade.symbol, "BTCUSDT");
                assert!(trade.is_buyer_maker);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
