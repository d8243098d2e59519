use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{
    OrderKind, OrderRequest, OrderRoute, TimeInForce, TradeOrderRequest, TradeOrderResult,
};
use crate::exchanges::binance::types::BinanceSpotOrderResponse;
use crate::exchanges::binance_perp::conversions::classify_rest_error;
use crate::exchanges::binance_perp::rest::as_pairs;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::str::FromStr;
use tracing::instrument;

const ORDER_ENDPOINT: &str = "/api/v3/order";

/// Signed spot order entry. Spot orders only travel over REST; failures are
/// classified exactly like the futures REST route.
pub struct BinanceSpotRestClient<R: RestClient> {
    rest: R,
}

impl<R: RestClient> BinanceSpotRestClient<R> {
    pub fn new(rest: R) -> Self {
        Self { rest }
    }

    /// Validate and place a LIMIT or MARKET order
    #[instrument(skip(self, order), fields(exchange = "binance", symbol = %order.symbol))]
    pub async fn place_order(
        &self,
        order: OrderRequest,
    ) -> Result<TradeOrderResult, ExchangeError> {
        let params = spot_order_params(order)?;
        let response: BinanceSpotOrderResponse = self
            .rest
            .post_json(ORDER_ENDPOINT, &as_pairs(&params), true)
            .await
            .map_err(classify_rest_error)?;
        Ok(convert_spot_order(response))
    }

    #[instrument(skip(self), fields(exchange = "binance", symbol = %symbol))]
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: u64,
    ) -> Result<TradeOrderResult, ExchangeError> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(ExchangeError::ValidationError(
                "Symbol is required".to_string(),
            ));
        }
        let order_id = order_id.to_string();
        let params = [("orderId", order_id.as_str()), ("symbol", symbol.as_str())];
        let response: BinanceSpotOrderResponse = self
            .rest
            .delete_json(ORDER_ENDPOINT, &params, true)
            .await
            .map_err(classify_rest_error)?;
        Ok(convert_spot_order(response))
    }
}

/// Unsigned spot order parameters. Futures-only fields and order types are
/// rejected rather than silently dropped.
pub fn spot_order_params(order: OrderRequest) -> Result<BTreeMap<String, String>, ExchangeError> {
    let futures_only = [
        ("positionSide", order.position_side.is_some()),
        ("reduceOnly", order.reduce_only.is_some()),
        ("workingType", order.working_type.is_some()),
        ("closePosition", order.close_position.is_some()),
        ("priceProtect", order.price_protect.is_some()),
    ];
    if let Some((field, _)) = futures_only.iter().find(|(_, set)| *set) {
        return Err(ExchangeError::ValidationError(format!(
            "{} is not supported for spot orders",
            field
        )));
    }

    let order = TradeOrderRequest::try_from(order)?;
    let mut params = BTreeMap::new();
    params.insert("symbol".to_string(), order.symbol().to_string());
    params.insert("side".to_string(), order.side().as_str().to_string());
    params.insert("type".to_string(), order.order_type().as_str().to_string());
    params.insert("quantity".to_string(), order.quantity().to_string());

    match *order.kind() {
        OrderKind::Market => {}
        OrderKind::Limit {
            time_in_force: TimeInForce::GTX,
            ..
        } => {
            return Err(ExchangeError::ValidationError(
                "GTX is not a spot time in force".to_string(),
            ));
        }
        OrderKind::Limit {
            price,
            time_in_force,
        } => {
            params.insert("price".to_string(), price.to_string());
            params.insert("timeInForce".to_string(), time_in_force.as_str().to_string());
        }
        _ => {
            return Err(ExchangeError::ValidationError(format!(
                "{} orders are not supported on spot",
                order.order_type()
            )));
        }
    }

    if let Some(client_id) = &order.new_client_order_id {
        params.insert("newClientOrderId".to_string(), client_id.clone());
    }
    Ok(params)
}

pub fn convert_spot_order(response: BinanceSpotOrderResponse) -> TradeOrderResult {
    let avg_price = average_fill_price(
        response.cumulative_quote_qty.as_deref(),
        &response.executed_qty,
    );
    TradeOrderResult {
        order_id: response.order_id,
        client_order_id: response.client_order_id,
        symbol: response.symbol,
        side: response.side,
        order_type: response.order_type,
        status: response.status,
        price: response.price,
        orig_qty: response.orig_qty,
        executed_qty: response.executed_qty,
        avg_price,
        update_time: response.transact_time.unwrap_or_default(),
        route: OrderRoute::Rest,
    }
}

/// Spot acks carry quote volume instead of an average price
fn average_fill_price(quote_qty: Option<&str>, executed_qty: &str) -> Option<String> {
    let quote = Decimal::from_str(quote_qty?).ok()?;
    let executed = Decimal::from_str(executed_qty).ok()?;
    if executed.is_zero() {
        return None;
    }
    Some((quote / executed).normalize().to_string())
}
