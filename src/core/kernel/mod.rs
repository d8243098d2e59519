//! Transport kernel shared by the exchange channels
//!
//! The kernel holds everything that is not specific to one venue: socket
//! lifecycle with reconnect backoff and keepalive, REST plumbing, request
//! signing and the codec seam for stream framing.
//!
//! ## Transport Layer
//! - `WsTransport`: opens raw sockets (`TungsteniteWs` in production)
//! - `Session`: one channel's socket, with connect timeout, keepalive and
//!   automatic reconnection
//! - `RestClient`: HTTP interface with signed query strings
//!
//! ## Authentication
//! - `Signer`: pluggable request signing
//! - `sign_params`: HMAC-SHA256 over the sorted parameter set
//!
//! ## Message Handling
//! - `WsCodec`: exchange-specific message encoding/decoding
//!
//! # Example
//! ```rust,no_run
//! use binance_bridge::core::config::ChannelConfig;
//! use binance_bridge::core::kernel::*;
//! use std::sync::Arc;
//! use tokio_tungstenite::tungstenite::Message;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(TungsteniteWs::new(
//!     "wss://fstream.binance.com/ws".to_string(),
//!     "binance_perp".to_string(),
//! ));
//! let (mut session, status) = Session::new(
//!     "market_data",
//!     transport,
//!     &ChannelConfig::default(),
//!     Message::Ping(Vec::new()),
//! );
//! session.open().await?;
//! assert!(status.borrow().is_connected());
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod codec;
pub mod keepalive;
pub mod rest;
pub mod signer;
#[cfg(test)]
pub(crate) mod testing;
pub mod ws;

// Re-export key types for convenience
pub use backoff::Backoff;
pub use codec::{StreamControl, WsCodec};
pub use keepalive::KeepAliveTimer;
pub use rest::{ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use signer::{canonical_query, sign_params, SignatureResult, Signer};
pub use ws::{
    ChannelState, ChannelStatus, ConnectionState, Opened, Session, SessionEvent, SessionSignal,
    TungsteniteWs, WsLink, WsTransport,
};
