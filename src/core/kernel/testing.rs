//! In-memory socket transport for driving channels in tests.

use crate::core::errors::ExchangeError;
use crate::core::kernel::ws::{WsLink, WsTransport};
use async_trait::async_trait;
use futures::channel::mpsc as fmpsc;
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;

/// What the next `open()` call does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockOpen {
    Accept,
    Refuse,
    /// Never completes; exercises the connect timeout
    Hang,
}

struct Script {
    queued: VecDeque<MockOpen>,
    fallback: MockOpen,
    attempts: Vec<Instant>,
}

pub struct MockTransport {
    script: Arc<Mutex<Script>>,
    peers: mpsc::UnboundedSender<MockPeer>,
}

/// Test side of the mock: receives one [`MockPeer`] per accepted connection.
pub struct MockServer {
    script: Arc<Mutex<Script>>,
    peers: mpsc::UnboundedReceiver<MockPeer>,
}

/// Server end of one accepted connection. Dropping it closes the socket.
pub struct MockPeer {
    pub outbound: fmpsc::UnboundedReceiver<Message>,
    pub inbound: fmpsc::UnboundedSender<Result<Message, ExchangeError>>,
}

pub fn mock_transport() -> (Arc<MockTransport>, MockServer) {
    let script = Arc::new(Mutex::new(Script {
        queued: VecDeque::new(),
        fallback: MockOpen::Accept,
        attempts: Vec::new(),
    }));
    let (tx, rx) = mpsc::unbounded_channel();
    (
        Arc::new(MockTransport {
            script: script.clone(),
            peers: tx,
        }),
        MockServer { script, peers: rx },
    )
}

#[async_trait]
impl WsTransport for MockTransport {
    async fn open(&self) -> Result<WsLink, ExchangeError> {
        let outcome = {
            let mut script = self.script.lock().unwrap();
            script.attempts.push(Instant::now());
            let fallback = script.fallback;
            script.queued.pop_front().unwrap_or(fallback)
        };

        match outcome {
            MockOpen::Refuse => Err(ExchangeError::TransportError(
                "connection refused".to_string(),
            )),
            MockOpen::Hang => std::future::pending().await,
            MockOpen::Accept => {
                let (out_tx, out_rx) = fmpsc::unbounded();
                let (in_tx, in_rx) = fmpsc::unbounded();
                let _ = self.peers.send(MockPeer {
                    outbound: out_rx,
                    inbound: in_tx,
                });
                Ok(WsLink {
                    sink: Box::pin(out_tx.sink_map_err(|e| {
                        ExchangeError::TransportError(format!("peer gone: {}", e))
                    })),
                    stream: Box::pin(in_rx),
                })
            }
        }
    }

    fn endpoint(&self) -> &str {
        "mock://"
    }
}

impl MockServer {
    pub fn queue(&self, outcomes: &[MockOpen]) {
        self.script.lock().unwrap().queued.extend(outcomes);
    }

    pub fn set_fallback(&self, outcome: MockOpen) {
        self.script.lock().unwrap().fallback = outcome;
    }

    /// Instants at which `open()` was called
    pub fn attempts(&self) -> Vec<Instant> {
        self.script.lock().unwrap().attempts.clone()
    }

    pub async fn accept(&mut self) -> MockPeer {
        self.peers.recv().await.expect("transport dropped")
    }
}

impl MockPeer {
    /// Next text frame sent by the client, parsed as JSON. Control frames are
    /// skipped.
    pub async fn recv_json(&mut self) -> Value {
        loop {
            match self.outbound.next().await.expect("client closed socket") {
                Message::Text(text) => return serde_json::from_str(&text).expect("client sent invalid json"),
                _ => continue,
            }
        }
    }

    pub async fn recv_frame(&mut self) -> Option<Message> {
        self.outbound.next().await
    }

    pub fn send_json(&mut self, value: Value) {
        self.inbound
            .unbounded_send(Ok(Message::Text(value.to_string())))
            .expect("client stream gone");
    }

    pub fn send_frame(&mut self, msg: Message) {
        self.inbound.unbounded_send(Ok(msg)).expect("client stream gone");
    }
}
