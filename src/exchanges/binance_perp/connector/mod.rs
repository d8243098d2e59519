use crate::core::errors::ExchangeError;
use crate::core::kernel::{ChannelStatus, RestClient};
use crate::core::traits::{
    AccountSettings, ExchangeConnector, FundingRateSource, MarketDataSource, OrderPlacer,
};
use crate::core::types::{
    FundingRate, LeverageSettings, MarginType, OrderRequest, TradeOrderResult,
};
use crate::exchanges::binance_perp::{
    codec::MarketEvent, market_channel::MarketDataChannel, trading_channel::TradingChannel,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use tokio::sync::broadcast;
use tracing::{info, instrument};

pub mod account;
pub mod market_data;
#[cfg(test)]
pub(crate) mod testing;
pub mod trading;

pub use account::Account;
pub use market_data::MarketData;
pub use trading::Trading;

/// Binance Perpetual connector composing the trading channel, the market data
/// channel and the REST fallback client
pub struct BinancePerpConnector<R: RestClient> {
    pub market: MarketData,
    pub trading: Trading<R>,
    pub account: Account<R>,
}

impl<R: RestClient + Clone> BinancePerpConnector<R> {
    pub fn new(rest: R, trading: TradingChannel, market: MarketDataChannel) -> Self {
        Self {
            market: MarketData::new(market),
            trading: Trading::new(trading, &rest),
            account: Account::new(&rest),
        }
    }
}

impl<R: RestClient> BinancePerpConnector<R> {
    /// Open both sockets. The market channel is opened even if the trading
    /// channel fails; the first error is returned.
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn connect(&self) -> Result<(), ExchangeError> {
        let trading = self.trading.channel().connect().await;
        let market = self.market.channel().connect().await;
        trading.and(market)?;
        info!("connected");
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.trading.channel().disconnect().await;
        self.market.channel().disconnect().await;
    }

    pub fn market_events(&self) -> broadcast::Receiver<MarketEvent> {
        self.market.events()
    }

    pub fn trading_status(&self) -> ChannelStatus {
        self.trading.channel().status()
    }

    pub fn market_status(&self) -> ChannelStatus {
        self.market.channel().status()
    }
}

// Implement traits for the connector by delegating to sub-components

#[async_trait]
impl<R: RestClient> OrderPlacer for BinancePerpConnector<R> {
    async fn place_order(&self, order: OrderRequest) -> Result<TradeOrderResult, ExchangeError> {
        self.trading.place_order(order).await
    }

    async fn cancel_order(
        &self,
        symbol: String,
        order_id: u64,
    ) -> Result<TradeOrderResult, ExchangeError> {
        self.trading.cancel_order(symbol, order_id).await
    }
}

#[async_trait]
impl<R: RestClient> MarketDataSource for BinancePerpConnector<R> {
    async fn subscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError> {
        self.market.subscribe(streams).await
    }

    async fn unsubscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError> {
        self.market.unsubscribe(streams).await
    }

    async fn list_active_subscriptions(&self) -> BTreeSet<String> {
        self.market.list_active_subscriptions().await
    }
}

#[async_trait]
impl<R: RestClient> AccountSettings for BinancePerpConnector<R> {
    async fn set_leverage(
        &self,
        symbol: String,
        leverage: u32,
    ) -> Result<LeverageSettings, ExchangeError> {
        self.account.set_leverage(symbol, leverage).await
    }

    async fn change_position_mode(&self, dual_side: bool) -> Result<(), ExchangeError> {
        self.account.change_position_mode(dual_side).await
    }

    async fn change_margin_type(
        &self,
        symbol: String,
        margin_type: MarginType,
    ) -> Result<(), ExchangeError> {
        self.account.change_margin_type(symbol, margin_type).await
    }
}

#[async_trait]
impl<R: RestClient> FundingRateSource for BinancePerpConnector<R> {
    async fn get_funding_rate(&self, symbol: String) -> Result<FundingRate, ExchangeError> {
        self.account.get_funding_rate(symbol).await
    }
}

impl<R: RestClient> ExchangeConnector for BinancePerpConnector<R> {}

#[cfg(test)]
mod tests {
    use super::testing::{order_ack, MockRest};
    use super::*;
    use crate::core::config::{ChannelConfig, Credentials};
    use crate::core::kernel::testing::mock_transport;
    use crate::core::kernel::ChannelState;
    use crate::core::types::{OrderRoute, OrderSide, OrderType, Quantity};
    use std::str::FromStr;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_connect_and_route_through_facade() {
        let (trading_transport, mut trading_server) = mock_transport();
        let (market_transport, mut market_server) = mock_transport();
        let config = ChannelConfig::default();
        let rest = MockRest::replying(order_ack(5, "BTCUSDT"));

        let connector = BinancePerpConnector::new(
            rest.clone(),
            TradingChannel::spawn(
                trading_transport,
                Arc::new(Credentials::new("key", "secret")),
                &config,
            ),
            MarketDataChannel::spawn(market_transport, &config),
        );
        connector.connect().await.unwrap();
        let mut trading_peer = trading_server.accept().await;
        let mut market_peer = market_server.accept().await;
        assert_eq!(connector.trading_status().state, ChannelState::Connected);
        assert!(connector.market_status().is_connected());

        connector
            .subscribe(vec!["btcusdt@bookTicker".to_string()])
            .await
            .unwrap();
        assert_eq!(market_peer.recv_json().await["method"], "SUBSCRIBE");
        assert_eq!(connector.list_active_subscriptions().await.len(), 1);

        // socket drops mid-request: the order is failed over to REST
        let order = OrderRequest::new(
            "BTCUSDT",
            OrderSide::Buy,
            OrderType::Market,
            Quantity::from_str("1").unwrap(),
        );
        let placing = tokio::spawn(async move {
            let result = connector.place_order(order).await;
            (connector, result)
        });
        trading_peer.recv_json().await;
        drop(trading_peer);

        let (connector, result) = placing.await.unwrap();
        assert_eq!(result.unwrap().route, OrderRoute::Rest);
        assert_eq!(rest.calls(), 1);

        connector.disconnect().await;
        assert!(!connector.market_status().is_connected());
    }
}
