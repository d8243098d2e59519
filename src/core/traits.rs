use crate::core::{
    errors::ExchangeError,
    types::{FundingRate, LeverageSettings, MarginType, OrderRequest, TradeOrderResult},
};
use async_trait::async_trait;
use std::collections::BTreeSet;

#[async_trait]
pub trait OrderPlacer {
    /// Validate and place a new order
    async fn place_order(&self, order: OrderRequest) -> Result<TradeOrderResult, ExchangeError>;

    /// Cancel an existing order by exchange order id
    async fn cancel_order(
        &self,
        symbol: String,
        order_id: u64,
    ) -> Result<TradeOrderResult, ExchangeError>;
}

#[async_trait]
pub trait MarketDataSource {
    /// Add streams to the live subscription set
    async fn subscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError>;

    /// Remove streams from the live subscription set
    async fn unsubscribe(&self, streams: Vec<String>) -> Result<(), ExchangeError>;

    async fn list_active_subscriptions(&self) -> BTreeSet<String>;
}

#[async_trait]
pub trait AccountSettings {
    async fn set_leverage(
        &self,
        symbol: String,
        leverage: u32,
    ) -> Result<LeverageSettings, ExchangeError>;

    /// `true` selects hedge mode, `false` one-way mode
    async fn change_position_mode(&self, dual_side: bool) -> Result<(), ExchangeError>;

    async fn change_margin_type(
        &self,
        symbol: String,
        margin_type: MarginType,
    ) -> Result<(), ExchangeError>;
}

#[async_trait]
pub trait FundingRateSource {
    async fn get_funding_rate(&self, symbol: String) -> Result<FundingRate, ExchangeError>;
}

// Composite trait for callers that need everything
#[async_trait]
pub trait ExchangeConnector:
    OrderPlacer + MarketDataSource + AccountSettings + FundingRateSource
{
}
