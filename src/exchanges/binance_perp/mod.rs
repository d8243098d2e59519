// Core modules - one responsibility per file
pub mod codec; // impl WsCodec + trading frames
pub mod conversions; // order params, error classification, response mapping
pub mod rest; // thin typed wrapper around RestClient
pub mod signer; // HMAC request signing
pub mod types; // serde structs <- raw JSON

// Channels own a socket each
pub mod market_channel;
pub mod trading_channel;

pub mod builder;
pub mod connector; // compose sub-traits

// Re-export main types for easier importing
pub use builder::{
    build_connector, build_connector_with, build_connector_with_credentials, Endpoints,
};
pub use codec::{
    agg_trade_stream, book_ticker_stream, kline_stream, mark_price_stream, BinancePerpCodec,
    BinancePerpMessage, MarketEvent,
};
pub use connector::BinancePerpConnector;
pub use conversions::{classify_api_error, classify_rest_error};
pub use market_channel::MarketDataChannel;
pub use rest::BinancePerpRestClient;
pub use signer::BinancePerpSigner;
pub use trading_channel::TradingChannel;
pub use types::*;
