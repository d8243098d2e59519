//! Recording REST client for connector tests.

use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub endpoint: String,
    pub params: Vec<(String, String)>,
    pub authenticated: bool,
}

#[derive(Clone)]
enum Reply {
    Json(Value),
    Api { code: i32, msg: String },
}

#[derive(Clone)]
pub struct MockRest {
    reply: Reply,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockRest {
    pub fn replying(body: Value) -> Self {
        Self {
            reply: Reply::Json(body),
            requests: Arc::default(),
        }
    }

    pub fn failing(code: i32, msg: &str) -> Self {
        Self {
            reply: Reply::Api {
                code,
                msg: msg.to_string(),
            },
            requests: Arc::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl RestClient for MockRest {
    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, &str)],
        authenticated: bool,
    ) -> Result<T, ExchangeError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            method,
            endpoint: endpoint.to_string(),
            params: params
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            authenticated,
        });
        match &self.reply {
            Reply::Json(value) => Ok(serde_json::from_value(value.clone())?),
            Reply::Api { code, msg } => Err(ExchangeError::ApiError {
                code: *code,
                message: msg.clone(),
            }),
        }
    }
}

pub fn order_ack(order_id: u64, symbol: &str) -> Value {
    json!({
        "orderId": order_id,
        "symbol": symbol,
        "status": "NEW",
        "clientOrderId": "rest-fallback",
        "price": "100",
        "avgPrice": "0.00",
        "origQty": "2",
        "executedQty": "0",
        "type": "LIMIT",
        "side": "SELL",
        "positionSide": "BOTH",
        "updateTime": 1_700_000_000_000_i64
    })
}
