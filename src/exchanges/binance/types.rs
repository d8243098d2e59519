use serde::{Deserialize, Serialize};

/// Acknowledgement returned by `POST` and `DELETE /api/v3/order`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BinanceSpotOrderResponse {
    pub symbol: String,
    #[serde(rename = "orderId")]
    pub order_id: u64,
    #[serde(rename = "clientOrderId")]
    pub client_order_id: String,
    /// Present on cancels: the id the order was placed with
    #[serde(rename = "origClientOrderId", default)]
    pub orig_client_order_id: Option<String>,
    #[serde(rename = "transactTime", default)]
    pub transact_time: Option<i64>,
    pub price: String,
    #[serde(rename = "origQty")]
    pub orig_qty: String,
    #[serde(rename = "executedQty")]
    pub executed_qty: String,
    #[serde(rename = "cummulativeQuoteQty", default)]
    pub cumulative_quote_qty: Option<String>,
    pub status: String,
    #[serde(rename = "timeInForce", default)]
    pub time_in_force: Option<String>,
    #[serde(rename = "type")]
    pub order_type: String,
    pub side: String,
}
