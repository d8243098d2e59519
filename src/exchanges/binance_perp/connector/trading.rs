use crate::core::{
    errors::ExchangeError,
    kernel::RestClient,
    traits::OrderPlacer,
    types::{OrderRequest, TradeOrderRequest, TradeOrderResult},
};
use crate::exchanges::binance_perp::{
    rest::BinancePerpRestClient, trading_channel::TradingChannel,
};
use async_trait::async_trait;
use tracing::{instrument, warn};

/// Order entry: WebSocket first, one REST attempt when the socket could not
/// carry the request.
pub struct Trading<R: RestClient> {
    channel: TradingChannel,
    rest: BinancePerpRestClient<R>,
}

impl<R: RestClient> Trading<R> {
    pub fn new(channel: TradingChannel, rest: &R) -> Self
    where
        R: Clone,
    {
        Self {
            channel,
            rest: BinancePerpRestClient::new(rest.clone()),
        }
    }

    pub fn channel(&self) -> &TradingChannel {
        &self.channel
    }
}

#[async_trait]
impl<R: RestClient> OrderPlacer for Trading<R> {
    #[instrument(skip(self, order), fields(exchange = "binance_perp", symbol = %order.symbol))]
    async fn place_order(&self, order: OrderRequest) -> Result<TradeOrderResult, ExchangeError> {
        let order = TradeOrderRequest::try_from(order)?;

        match self.channel.place_order(&order).await {
            Err(e) if e.is_transport() => {
                warn!(error = %e, "socket order failed, falling back to REST");
                self.rest.place_order(&order).await
            }
            result => result,
        }
    }

    #[instrument(skip(self), fields(exchange = "binance_perp", symbol = %symbol))]
    async fn cancel_order(
        &self,
        symbol: String,
        order_id: u64,
    ) -> Result<TradeOrderResult, ExchangeError> {
        match self.channel.cancel_order(&symbol, order_id).await {
            Err(e) if e.is_transport() => {
                warn!(error = %e, "socket cancel failed, falling back to REST");
                self.rest.cancel_order(&symbol, order_id).await
            }
            result => result,
        }
    }
}
