use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Outbound trading request: `{id, method, params}`
#[derive(Debug, Clone, Serialize)]
pub struct BinancePerpWsRequest {
    pub id: String,
    pub method: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinancePerpWsError {
    pub code: i32,
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinancePerpRateLimit {
    #[serde(rename = "rateLimitType")]
    pub rate_limit_type: String,
    pub interval: String,
    #[serde(rename = "intervalNum")]
    pub interval_num: u32,
    pub limit: u32,
    #[serde(default)]
    pub count: Option<u32>,
}

/// Inbound trading response: `{id, status, result | error, rateLimits}`
#[derive(Debug, Clone, Deserialize)]
pub struct BinancePerpWsResponse {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<u16>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<BinancePerpWsError>,
    #[serde(rename = "rateLimits", default)]
    pub rate_limits: Option<Vec<BinancePerpRateLimit>>,
}

/// Order acknowledgement, shared by `order.place`, `order.cancel` and
/// `/fapi/v1/order`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinancePerpOrderResponse {
    #[serde(rename = "orderId")]
    pub order_id: u64,
    pub symbol: String,
    pub status: String,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    pub price: String,
    #[serde(rename = "avgPrice", default)]
    pub avg_price: Option<String>,
    #[serde(rename = "origQty")]
    pub orig_qty: String,
    #[serde(rename = "executedQty")]
    pub executed_qty: String,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
    #[serde(rename = "positionSide", default)]
    pub position_side: Option<String>,
    #[serde(rename = "updateTime")]
    pub update_time: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinancePerpLeverageResponse {
    pub leverage: u32,
    #[serde(rename = "maxNotionalValue", default)]
    pub max_notional_value: Option<String>,
    pub symbol: String,
}

/// Plain `{code, msg}` acknowledgement returned by account setting endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct BinancePerpStatusResponse {
    pub code: i32,
    pub msg: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinancePerpPremiumIndex {
    pub symbol: String,
    #[serde(rename = "markPrice")]
    pub mark_price: String,
    #[serde(rename = "indexPrice")]
    pub index_price: String,
    #[serde(rename = "lastFundingRate")]
    pub last_funding_rate: String,
    #[serde(rename = "nextFundingTime")]
    pub next_funding_time: i64,
    pub time: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinancePerpBookTicker {
    #[serde(rename = "u")]
    pub update_id: u64,
    #[serde(rename = "E", default)]
    pub event_time: i64,
    #[serde(rename = "T", default)]
    pub transaction_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "b")]
    pub best_bid_price: String,
    #[serde(rename = "B")]
    pub best_bid_qty: String,
    #[serde(rename = "a")]
    pub best_ask_price: String,
    #[serde(rename = "A")]
    pub best_ask_qty: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinancePerpMarkPrice {
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "p")]
    pub mark_price: String,
    #[serde(rename = "i", default)]
    pub index_price: Option<String>,
    #[serde(rename = "P", default)]
    pub estimated_settle_price: Option<String>,
    #[serde(rename = "r")]
    pub funding_rate: String,
    #[serde(rename = "T")]
    pub next_funding_time: i64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinancePerpAggTrade {
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "a")]
    pub agg_trade_id: u64,
    #[serde(rename = "p")]
    pub price: String,
    #[serde(rename = "q")]
    pub quantity: String,
    #[serde(rename = "f")]
    pub first_trade_id: u64,
    #[serde(rename = "l")]
    pub last_trade_id: u64,
    #[serde(rename = "T")]
    pub trade_time: i64,
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinancePerpKline {
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinancePerpKlineData,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BinancePerpKlineData {
    #[serde(rename = "t")]
    pub open_time: i64,
    #[serde(rename = "T")]
    pub close_time: i64,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o")]
    pub open_price: String,
    #[serde(rename = "h")]
    pub high_price: String,
    #[serde(rename = "l")]
    pub low_price: String,
    #[serde(rename = "c")]
    pub close_price: String,
    #[serde(rename = "v")]
    pub volume: String,
    #[serde(rename = "n")]
    pub number_of_trades: u64,
    #[serde(rename = "x")]
    pub is_closed: bool,
}
