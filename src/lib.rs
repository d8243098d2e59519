//! Binance USDⓈ-M futures connectivity: WebSocket order entry with REST
//! fallback, and market streams with subscriptions that survive reconnects.
//!
//! ```rust,no_run
//! use binance_bridge::core::config::ExchangeConfig;
//! use binance_bridge::core::traits::{MarketDataSource, OrderPlacer};
//! use binance_bridge::exchanges::binance_perp::{book_ticker_stream, build_connector};
//! use binance_bridge::{OrderRequest, OrderSide, OrderType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let connector = build_connector(ExchangeConfig::from_env("BINANCE")?)?;
//! connector.connect().await?;
//! connector.subscribe(vec![book_ticker_stream("BTCUSDT")]).await?;
//!
//! let order = OrderRequest::new("BTCUSDT", OrderSide::Buy, OrderType::Market, "0.001".parse()?);
//! let placed = connector.place_order(order).await?;
//! println!("order {} via {:?}", placed.order_id, placed.route);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod exchanges;

pub use self::core::{errors::ExchangeError, traits::ExchangeConnector, types::*};
pub use exchanges::binance::BinanceSpotRestClient;
pub use exchanges::binance_perp::BinancePerpConnector;
