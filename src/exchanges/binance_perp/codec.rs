use crate::core::errors::ExchangeError;
use crate::core::kernel::{StreamControl, WsCodec};
use crate::exchanges::binance_perp::types::{
    BinancePerpAggTrade, BinancePerpBookTicker, BinancePerpKline, BinancePerpMarkPrice,
    BinancePerpWsRequest, BinancePerpWsResponse,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;

/// Correlation id reserved for liveness pings on the trading socket
pub const KEEPALIVE_ID: &str = "keepalive";

/// Decoded market stream payload
#[derive(Debug, Clone, PartialEq)]
pub enum MarketEvent {
    BookTicker(BinancePerpBookTicker),
    MarkPrice(BinancePerpMarkPrice),
    AggTrade(BinancePerpAggTrade),
    Kline(BinancePerpKline),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BinancePerpMessage {
    Event(MarketEvent),
    /// Acknowledgement of a SUBSCRIBE/UNSUBSCRIBE frame
    Ack { id: u64 },
    /// Control frame rejected by the server
    ControlError {
        id: Option<u64>,
        code: i64,
        msg: String,
    },
}

pub struct BinancePerpCodec;

impl WsCodec for BinancePerpCodec {
    type Message = BinancePerpMessage;

    fn encode_control(
        &self,
        control: StreamControl,
        streams: &[impl AsRef<str> + Send + Sync],
        id: u64,
    ) -> Result<Message, ExchangeError> {
        let method = match control {
            StreamControl::Subscribe => "SUBSCRIBE",
            StreamControl::Unsubscribe => "UNSUBSCRIBE",
        };
        let params: Vec<&str> = streams.iter().map(AsRef::as_ref).collect();
        Ok(Message::Text(
            json!({ "method": method, "params": params, "id": id }).to_string(),
        ))
    }

    fn decode_message(&self, message: Message) -> Result<Option<Self::Message>, ExchangeError> {
        let Some(text) = frame_text(message)? else {
            return Ok(None);
        };
        let value: Value = serde_json::from_str(&text)?;

        // Combined stream format wraps the event
        if let Some(data) = value.get("data").filter(|_| value.get("stream").is_some()) {
            return decode_event(data);
        }

        if value.get("e").is_some() {
            return decode_event(&value);
        }

        if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
            return Ok(Some(BinancePerpMessage::ControlError {
                id: value.get("id").and_then(Value::as_u64),
                code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
                msg: error
                    .get("msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            }));
        }

        if value.get("result").is_some() {
            if let Some(id) = value.get("id").and_then(Value::as_u64) {
                return Ok(Some(BinancePerpMessage::Ack { id }));
            }
        }

        Ok(None)
    }
}

fn frame_text(message: Message) -> Result<Option<String>, ExchangeError> {
    match message {
        Message::Text(text) => Ok(Some(text)),
        Message::Binary(data) => String::from_utf8(data).map(Some).map_err(|e| {
            ExchangeError::TransportError(format!("Invalid UTF-8 in binary message: {}", e))
        }),
        _ => Ok(None),
    }
}

fn decode_event(data: &Value) -> Result<Option<BinancePerpMessage>, ExchangeError> {
    fn parse<T: DeserializeOwned>(data: &Value) -> Result<T, ExchangeError> {
        Ok(T::deserialize(data)?)
    }

    let event = match data.get("e").and_then(Value::as_str) {
        Some("bookTicker") => MarketEvent::BookTicker(parse(data)?),
        Some("markPriceUpdate") => MarketEvent::MarkPrice(parse(data)?),
        Some("aggTrade") => MarketEvent::AggTrade(parse(data)?),
        Some("kline") => MarketEvent::Kline(parse(data)?),
        _ => return Ok(None),
    };
    Ok(Some(BinancePerpMessage::Event(event)))
}

/// Serialize a trading request frame
pub fn encode_trading_request(request: &BinancePerpWsRequest) -> Result<Message, ExchangeError> {
    Ok(Message::Text(serde_json::to_string(request)?))
}

/// JSON liveness ping sent on the trading socket
pub fn trading_keepalive() -> Message {
    Message::Text(
        json!({
            "id": KEEPALIVE_ID,
            "method": "ping"
        })
        .to_string(),
    )
}

/// Parse a trading response. Non-data frames yield `None`.
pub fn decode_trading_response(
    message: Message,
) -> Result<Option<BinancePerpWsResponse>, ExchangeError> {
    match frame_text(message)? {
        Some(text) => Ok(Some(serde_json::from_str(&text)?)),
        None => Ok(None),
    }
}

/// Stream name helpers (stream names are lowercase)
pub fn book_ticker_stream(symbol: &str) -> String {
    format!("{}@bookTicker", symbol.to_lowercase())
}

pub fn mark_price_stream(symbol: &str) -> String {
    format!("{}@markPrice", symbol.to_lowercase())
}

pub fn agg_trade_stream(symbol: &str) -> String {
    format!("{}@aggTrade", symbol.to_lowercase())
}

pub fn kline_stream(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{}", symbol.to_lowercase(), interval)
}
