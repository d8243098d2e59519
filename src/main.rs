use anyhow::Context;
use binance_bridge::core::config::{ChannelConfig, EnvCredentials, ExchangeConfig};
use binance_bridge::core::traits::{FundingRateSource, MarketDataSource};
use binance_bridge::exchanges::binance_perp::{
    book_ticker_stream, build_connector_with_credentials, mark_price_stream, Endpoints,
    MarketEvent,
};
use std::sync::Arc;
use tracing::{info, warn};

const SYMBOL: &str = "BTCUSDT";
const EVENTS_TO_PRINT: usize = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_target(false).init();

    #[cfg(feature = "env-file")]
    let _ = dotenv::dotenv();

    // Testnet unless explicitly disabled
    let testnet = std::env::var("BINANCE_TESTNET").map_or(true, |v| v != "false");
    let endpoints = Endpoints::for_config(&ExchangeConfig::read_only().testnet(testnet));
    let connector = build_connector_with_credentials(
        &endpoints,
        Arc::new(EnvCredentials::default()),
        ChannelConfig::default(),
    )
    .context("building connector")?;

    if let Err(e) = connector.connect().await {
        // market data still works without trading credentials
        warn!(error = %e, "connect incomplete");
    }

    match connector.get_funding_rate(SYMBOL.to_string()).await {
        Ok(rate) => info!(symbol = %rate.symbol, rate = %rate.funding_rate, mark = %rate.mark_price, "funding"),
        Err(e) => warn!(error = %e, "funding rate unavailable"),
    }

    let mut events = connector.market_events();
    connector
        .subscribe(vec![book_ticker_stream(SYMBOL), mark_price_stream(SYMBOL)])
        .await
        .context("subscribing to market streams")?;

    for _ in 0..EVENTS_TO_PRINT {
        match events.recv().await? {
            MarketEvent::BookTicker(t) => info!(
                symbol = %t.symbol,
                bid = %t.best_bid_price,
                ask = %t.best_ask_price,
                "book ticker"
            ),
            MarketEvent::MarkPrice(m) => {
                info!(symbol = %m.symbol, mark = %m.mark_price, funding = %m.funding_rate, "mark price");
            }
            other => info!(event = ?other, "event"),
        }
    }

    connector.disconnect().await;
    Ok(())
}
