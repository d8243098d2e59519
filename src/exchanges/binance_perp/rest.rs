use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{
    FundingRate, LeverageSettings, MarginType, OrderRoute, TradeOrderRequest, TradeOrderResult,
};
use crate::exchanges::binance_perp::conversions::{
    cancel_params, classify_rest_error, convert_leverage_response, convert_order_response,
    convert_premium_index, order_params,
};
use crate::exchanges::binance_perp::types::{
    BinancePerpLeverageResponse, BinancePerpOrderResponse, BinancePerpPremiumIndex,
    BinancePerpStatusResponse,
};
use std::collections::BTreeMap;
use tracing::instrument;

/// REST API operations for Binance Perpetual
///
/// Every failure leaving this type is already classified into the business
/// error taxonomy.
pub struct BinancePerpRestClient<R: RestClient> {
    rest: R,
}

pub(crate) fn as_pairs(params: &BTreeMap<String, String>) -> Vec<(&str, &str)> {
    params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}

impl<R: RestClient> BinancePerpRestClient<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    #[instrument(skip(self, order), fields(exchange = "binance_perp", symbol = %order.symbol()))]
    pub async fn place_order(
        &self,
        order: &TradeOrderRequest,
    ) -> Result<TradeOrderResult, ExchangeError> {
        let params = order_params(order);
        let response: BinancePerpOrderResponse = self
            .rest
            .post_json("/fapi/v1/order", &as_pairs(&params), true)
            .await
            .map_err(classify_rest_error)?;
        Ok(convert_order_response(response, OrderRoute::Rest))
    }

    #[instrument(skip(self), fields(exchange = "binance_perp", symbol = %symbol))]
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: u64,
    ) -> Result<TradeOrderResult, ExchangeError> {
        let params = cancel_params(symbol, order_id);
        let response: BinancePerpOrderResponse = self
            .rest
            .delete_json("/fapi/v1/order", &as_pairs(&params), true)
            .await
            .map_err(classify_rest_error)?;
        Ok(convert_order_response(response, OrderRoute::Rest))
    }

    #[instrument(skip(self), fields(exchange = "binance_perp", symbol = %symbol))]
    pub async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
    ) -> Result<LeverageSettings, ExchangeError> {
        if !(1..=125).contains(&leverage) {
            return Err(ExchangeError::ValidationError(format!(
                "Leverage must be between 1 and 125, got {}",
                leverage
            )));
        }
        let symbol = symbol.to_uppercase();
        let leverage = leverage.to_string();
        let params = [("symbol", symbol.as_str()), ("leverage", leverage.as_str())];
        let response: BinancePerpLeverageResponse = self
            .rest
            .post_json("/fapi/v1/leverage", &params, true)
            .await
            .map_err(classify_rest_error)?;
        Ok(convert_leverage_response(response))
    }

    /// Switch between hedge (dual side) and one-way position mode
    #[instrument(skip(self), fields(exchange = "binance_perp"))]
    pub async fn change_position_mode(&self, dual_side: bool) -> Result<(), ExchangeError> {
        let dual_side = dual_side.to_string();
        let _: BinancePerpStatusResponse = self
            .rest
            .post_json(
                "/fapi/v1/positionSide/dual",
                &[("dualSidePosition", dual_side.as_str())],
                true,
            )
            .await
            .map_err(classify_rest_error)?;
        Ok(())
    }

    #[instrument(skip(self), fields(exchange = "binance_perp", symbol = %symbol))]
    pub async fn change_margin_type(
        &self,
        symbol: &str,
        margin_type: MarginType,
    ) -> Result<(), ExchangeError> {
        let symbol = symbol.to_uppercase();
        let params = [
            ("symbol", symbol.as_str()),
            ("marginType", margin_type.as_str()),
        ];
        let _: BinancePerpStatusResponse = self
            .rest
            .post_json("/fapi/v1/marginType", &params, true)
            .await
            .map_err(classify_rest_error)?;
        Ok(())
    }

    /// Current funding rate and mark price from the premium index
    #[instrument(skip(self), fields(exchange = "binance_perp", symbol = %symbol))]
    pub async fn funding_rate(&self, symbol: &str) -> Result<FundingRate, ExchangeError> {
        let symbol = symbol.to_uppercase();
        let index: BinancePerpPremiumIndex = self
            .rest
            .get_json("/fapi/v1/premiumIndex", &[("symbol", symbol.as_str())], false)
            .await
            .map_err(classify_rest_error)?;
        Ok(convert_premium_index(index))
    }
}
