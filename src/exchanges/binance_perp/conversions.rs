use crate::core::errors::ExchangeError;
use crate::core::types::{
    FundingRate, LeverageSettings, OrderKind, OrderRoute, TradeOrderRequest, TradeOrderResult,
};
use crate::exchanges::binance_perp::types::{
    BinancePerpLeverageResponse, BinancePerpOrderResponse, BinancePerpPremiumIndex,
};
use std::collections::BTreeMap;

const MARGIN_CODES: [i32; 3] = [-2019, -2027, -2028];
const POSITION_MODE_CODES: [i32; 3] = [-4061, -4067, -4068];

const MARGIN_PATTERNS: [&str; 3] = [
    "insufficient margin",
    "margin is insufficient",
    "isolated balance insufficient",
];
const POSITION_MODE_PATTERNS: [&str; 2] = ["invalid position mode", "position side does not match"];

/// Unsigned order parameters, identical for the socket and REST routes.
pub fn order_params(order: &TradeOrderRequest) -> BTreeMap<String, String> {
    let mut params = BTreeMap::new();
    params.insert("symbol".to_string(), order.symbol().to_string());
    params.insert("side".to_string(), order.side().as_str().to_string());
    params.insert("type".to_string(), order.order_type().as_str().to_string());
    params.insert("quantity".to_string(), order.quantity().to_string());

    match *order.kind() {
        OrderKind::Market => {}
        OrderKind::Limit {
            price,
            time_in_force,
        } => {
            params.insert("price".to_string(), price.to_string());
            params.insert("timeInForce".to_string(), time_in_force.as_str().to_string());
        }
        OrderKind::Stop {
            price,
            stop_price,
            time_in_force,
        }
        | OrderKind::TakeProfit {
            price,
            stop_price,
            time_in_force,
        } => {
            params.insert("price".to_string(), price.to_string());
            params.insert("stopPrice".to_string(), stop_price.to_string());
            params.insert("timeInForce".to_string(), time_in_force.as_str().to_string());
        }
        OrderKind::StopMarket { stop_price } | OrderKind::TakeProfitMarket { stop_price } => {
            params.insert("stopPrice".to_string(), stop_price.to_string());
        }
        OrderKind::TrailingStopMarket {
            callback_rate,
            activation_price,
        } => {
            params.insert("callbackRate".to_string(), callback_rate.normalize().to_string());
            if let Some(activation_price) = activation_price {
                params.insert("activationPrice".to_string(), activation_price.to_string());
            }
        }
    }

    if let Some(position_side) = order.position_side {
        params.insert("positionSide".to_string(), position_side.as_str().to_string());
    }
    if let Some(reduce_only) = order.reduce_only {
        params.insert("reduceOnly".to_string(), reduce_only.to_string());
    }
    if let Some(working_type) = order.working_type {
        params.insert("workingType".to_string(), working_type.as_str().to_string());
    }
    if let Some(close_position) = order.close_position {
        params.insert("closePosition".to_string(), close_position.to_string());
    }
    if let Some(price_protect) = order.price_protect {
        params.insert("priceProtect".to_string(), price_protect.to_string());
    }
    if let Some(client_id) = &order.new_client_order_id {
        params.insert("newClientOrderId".to_string(), client_id.clone());
    }

    params
}

pub fn cancel_params(symbol: &str, order_id: u64) -> BTreeMap<String, String> {
    BTreeMap::from([
        ("symbol".to_string(), symbol.to_uppercase()),
        ("orderId".to_string(), order_id.to_string()),
    ])
}

/// Map an exchange rejection onto the business error taxonomy.
///
/// Structured codes win; the message text is the fallback.
pub fn classify_api_error(code: i32, message: &str) -> ExchangeError {
    let lower = message.to_lowercase();
    if MARGIN_CODES.contains(&code) || MARGIN_PATTERNS.iter().any(|p| lower.contains(p)) {
        return ExchangeError::MarginError(message.to_string());
    }
    if POSITION_MODE_CODES.contains(&code)
        || POSITION_MODE_PATTERNS.iter().any(|p| lower.contains(p))
    {
        return ExchangeError::PositionModeError(message.to_string());
    }
    ExchangeError::GenericClientError(format!("{} (code {})", message, code))
}

/// Classify any REST failure. Local validation and credential errors pass
/// through.
pub fn classify_rest_error(err: ExchangeError) -> ExchangeError {
    match err {
        ExchangeError::ApiError { code, message } => classify_api_error(code, &message),
        ExchangeError::ValidationError(_)
        | ExchangeError::AuthError(_)
        | ExchangeError::MarginError(_)
        | ExchangeError::PositionModeError(_)
        | ExchangeError::GenericClientError(_) => err,
        other => {
            let text = other.to_string();
            let lower = text.to_lowercase();
            if MARGIN_PATTERNS.iter().any(|p| lower.contains(p)) {
                ExchangeError::MarginError(text)
            } else if POSITION_MODE_PATTERNS.iter().any(|p| lower.contains(p)) {
                ExchangeError::PositionModeError(text)
            } else {
                ExchangeError::GenericClientError(text)
            }
        }
    }
}

pub fn convert_order_response(
    response: BinancePerpOrderResponse,
    route: OrderRoute,
) -> TradeOrderResult {
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
        avg_price: response.avg_price,
        update_time: response.update_time,
        route,
    }
}

pub fn convert_leverage_response(response: BinancePerpLeverageResponse) -> LeverageSettings {
    LeverageSettings {
        symbol: response.symbol,
        leverage: response.leverage,
    }
}

pub fn convert_premium_index(index: BinancePerpPremiumIndex) -> FundingRate {
    FundingRate {
        symbol: index.symbol,
        mark_price: index.mark_price,
        funding_rate: index.last_funding_rate,
        next_funding_time: index.next_funding_time,
        time: index.time,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{OrderRequest, OrderSide, OrderType, Price, Quantity};
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn order(order_type: OrderType) -> OrderRequest {
        OrderRequest::new(
            "btcusdt",
            OrderSide::Buy,
            order_type,
            Quantity::from_str("0.010").unwrap(),
        )
    }

    #[test]
    fn test_limit_params() {
        let req = TradeOrderRequest::try_from(
            order(OrderType::Limit).with_price(Price::from_str("65000.50").unwrap()),
        )
        .unwrap();
        let params = order_params(&req);

        assert_eq!(params["symbol"], "BTCUSDT");
        assert_eq!(params["side"], "BUY");
        assert_eq!(params["type"], "LIMIT");
        assert_eq!(params["quantity"], "0.01");
        assert_eq!(params["price"], "65000.5");
        assert_eq!(params["timeInForce"], "GTC");
        assert!(!params.contains_key("stopPrice"));
    }

    #[test]
    fn test_market_params_have_no_price() {
        let req = TradeOrderRequest::try_from(order(OrderType::Market).with_reduce_only(true))
            .unwrap();
        let params = order_params(&req);

        assert!(!params.contains_key("price"));
        assert!(!params.contains_key("timeInForce"));
        assert_eq!(params["reduceOnly"], "true");
    }

    #[test]
    fn test_trailing_stop_params() {
        let req = TradeOrderRequest::try_from(
            order(OrderType::TrailingStopMarket).with_callback_rate(Decimal::new(15, 1)),
        )
        .unwrap();
        let params = order_params(&req);
        assert_eq!(params["callbackRate"], "1.5");
        assert!(!params.contains_key("activationPrice"));
    }

    #[test]
    fn test_classify_by_code() {
        assert!(matches!(
            classify_api_error(-2019, "Margin is insufficient."),
            ExchangeError::MarginError(_)
        ));
        assert!(matches!(
            classify_api_error(-4061, "Order's position side does not match user's setting."),
            ExchangeError::PositionModeError(_)
        ));
        assert!(matches!(
            classify_api_error(-1121, "Invalid symbol."),
            ExchangeError::GenericClientError(_)
        ));
    }

    #[test]
    fn test_classify_by_text() {
        assert!(matches!(
            classify_api_error(-1000, "Account has insufficient margin for this order"),
            ExchangeError::MarginError(_)
        ));
        assert!(matches!(
            classify_api_error(-1000, "Invalid position mode"),
            ExchangeError::PositionModeError(_)
        ));
        assert!(matches!(
            classify_rest_error(ExchangeError::TransportError(
                "isolated balance insufficient".to_string()
            )),
            ExchangeError::MarginError(_)
        ));
        assert!(matches!(
            classify_rest_error(ExchangeError::TransportError("connection reset".to_string())),
            ExchangeError::GenericClientError(_)
        ));
    }

    #[test]
    fn test_validation_passes_through() {
        let err = classify_rest_error(ExchangeError::ValidationError("bad".to_string()));
        assert!(matches!(err, ExchangeError::ValidationError(_)));
    }
}
