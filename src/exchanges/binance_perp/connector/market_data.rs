use crate::core::{errors::ExchangeError, traits::MarketDataSource};
use crate::exchanges::binance_perp::{codec::MarketEvent, market_channel::MarketDataChannel};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tracing::instrument;

/// Market data implementation for Binance Perpetual
pub struct MarketData {
    channel: MarketDataChannel,
}

impl MarketData {
    pub fn new(channel: MarketDataChannel) -> Self {
        Self { channel }
    }

    pub fn channel(&self) -> &MarketDataChannel {
        &self.channel
    }

    pub fn events(&self) -> broadcast::Receiver<MarketEvent> {
        self.channel.events()
    }
}

#[async_trait]
impl MarketDataSource for MarketData {
    #[instrument(skip(self), fields(exchange = "binance_perp", count = streams.len()))]
    async fn subscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError> {
        self.channel.subscribe(streams).await
    }

    #[instrument(skip(self), fields(exchange = "binance_perp", count = streams.len()))]
    async fn unsubscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError> {
        self.channel.unsubscribe(streams).await
    }

    async fn list_active_subscriptions(&self) -> BTreeSet<String> {
        self.channel.list_active_subscriptions().await
    }
}
