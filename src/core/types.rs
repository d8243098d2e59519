use crate::core::errors::ExchangeError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Type-safe price representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(#[serde(with = "rust_decimal::serde::str")] pub Decimal);

impl Price {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl std::str::FromStr for Price {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse()
            .map(Self)
            .map_err(|e| ExchangeError::ValidationError(format!("Invalid price '{}': {}", s, e)))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

/// Type-safe quantity representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(#[serde(with = "rust_decimal::serde::str")] pub Decimal);

impl Quantity {
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl std::str::FromStr for Quantity {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self).map_err(|e| {
            ExchangeError::ValidationError(format!("Invalid quantity '{}': {}", s, e))
        })
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    Stop,
    StopMarket,
    TakeProfit,
    TakeProfitMarket,
    TrailingStopMarket,
}

impl OrderType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Limit => "LIMIT",
            Self::Market => "MARKET",
            Self::Stop => "STOP",
            Self::StopMarket => "STOP_MARKET",
            Self::TakeProfit => "TAKE_PROFIT",
            Self::TakeProfitMarket => "TAKE_PROFIT_MARKET",
            Self::TrailingStopMarket => "TRAILING_STOP_MARKET",
        }
    }

    pub const fn requires_price(self) -> bool {
        matches!(self, Self::Limit | Self::Stop | Self::TakeProfit)
    }

    pub const fn requires_stop_price(self) -> bool {
        matches!(
            self,
            Self::Stop | Self::StopMarket | Self::TakeProfit | Self::TakeProfitMarket
        )
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionSide {
    Both,
    Long,
    Short,
}

impl PositionSide {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Both => "BOTH",
            Self::Long => "LONG",
            Self::Short => "SHORT",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimeInForce {
    GTC,
    IOC,
    FOK,
    GTX,
}

impl TimeInForce {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GTC => "GTC",
            Self::IOC => "IOC",
            Self::FOK => "FOK",
            Self::GTX => "GTX",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkingType {
    MarkPrice,
    ContractPrice,
}

impl WorkingType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MarkPrice => "MARK_PRICE",
            Self::ContractPrice => "CONTRACT_PRICE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MarginType {
    Isolated,
    Crossed,
}

impl MarginType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Isolated => "ISOLATED",
            Self::Crossed => "CROSSED",
        }
    }
}

/// Order as received from a caller: every type-specific field is optional.
///
/// Convert into a [`TradeOrderRequest`] to validate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub quantity: Quantity,
    #[serde(default)]
    pub price: Option<Price>,
    #[serde(default)]
    pub stop_price: Option<Price>,
    #[serde(default)]
    pub position_side: Option<PositionSide>,
    #[serde(default)]
    pub time_in_force: Option<TimeInForce>,
    #[serde(default)]
    pub reduce_only: Option<bool>,
    #[serde(default)]
    pub working_type: Option<WorkingType>,
    #[serde(default)]
    pub activation_price: Option<Price>,
    #[serde(default)]
    pub callback_rate: Option<Decimal>,
    #[serde(default)]
    pub close_position: Option<bool>,
    #[serde(default)]
    pub price_protect: Option<bool>,
    #[serde(default)]
    pub new_client_order_id: Option<String>,
}

impl OrderRequest {
    /// Minimal request; type-specific fields are filled in with the `with_*` setters.
    pub fn new(
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        quantity: Quantity,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type,
            quantity,
            price: None,
            stop_price: None,
            position_side: None,
            time_in_force: None,
            reduce_only: None,
            working_type: None,
            activation_price: None,
            callback_rate: None,
            close_position: None,
            price_protect: None,
            new_client_order_id: None,
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: Price) -> Self {
        self.price = Some(price);
        self
    }

    #[must_use]
    pub fn with_stop_price(mut self, stop_price: Price) -> Self {
        self.stop_price = Some(stop_price);
        self
    }

    #[must_use]
    pub fn with_callback_rate(mut self, callback_rate: Decimal) -> Self {
        self.callback_rate = Some(callback_rate);
        self
    }

    #[must_use]
    pub fn with_position_side(mut self, position_side: PositionSide) -> Self {
        self.position_side = Some(position_side);
        self
    }

    #[must_use]
    pub fn with_time_in_force(mut self, time_in_force: TimeInForce) -> Self {
        self.time_in_force = Some(time_in_force);
        self
    }

    #[must_use]
    pub fn with_reduce_only(mut self, reduce_only: bool) -> Self {
        self.reduce_only = Some(reduce_only);
        self
    }
}

/// The order-type-specific part of a validated order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderKind {
    Market,
    Limit {
        price: Price,
        time_in_force: TimeInForce,
    },
    Stop {
        price: Price,
        stop_price: Price,
        time_in_force: TimeInForce,
    },
    StopMarket {
        stop_price: Price,
    },
    TakeProfit {
        price: Price,
        stop_price: Price,
        time_in_force: TimeInForce,
    },
    TakeProfitMarket {
        stop_price: Price,
    },
    TrailingStopMarket {
        callback_rate: Decimal,
        activation_price: Option<Price>,
    },
}

impl OrderKind {
    pub const fn order_type(&self) -> OrderType {
        match self {
            Self::Market => OrderType::Market,
            Self::Limit { .. } => OrderType::Limit,
            Self::Stop { .. } => OrderType::Stop,
            Self::StopMarket { .. } => OrderType::StopMarket,
            Self::TakeProfit { .. } => OrderType::TakeProfit,
            Self::TakeProfitMarket { .. } => OrderType::TakeProfitMarket,
            Self::TrailingStopMarket { .. } => OrderType::TrailingStopMarket,
        }
    }
}

/// Validated, immutable order. Only constructible through `TryFrom<OrderRequest>`,
/// so every instance carries the fields its order type needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOrderRequest {
    symbol: String,
    side: OrderSide,
    quantity: Quantity,
    kind: OrderKind,
    pub position_side: Option<PositionSide>,
    pub reduce_only: Option<bool>,
    pub working_type: Option<WorkingType>,
    pub close_position: Option<bool>,
    pub price_protect: Option<bool>,
    pub new_client_order_id: Option<String>,
}

impl TradeOrderRequest {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub const fn side(&self) -> OrderSide {
        self.side
    }

    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub const fn kind(&self) -> &OrderKind {
        &self.kind
    }

    pub const fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }
}

impl TryFrom<OrderRequest> for TradeOrderRequest {
    type Error = ExchangeError;

    fn try_from(req: OrderRequest) -> Result<Self, Self::Error> {
        if req.symbol.trim().is_empty() {
            return Err(ExchangeError::ValidationError(
                "Symbol is required".to_string(),
            ));
        }
        if req.quantity.value() <= Decimal::ZERO {
            return Err(ExchangeError::ValidationError(format!(
                "Quantity must be positive, got {}",
                req.quantity
            )));
        }

        let order_type = req.order_type;
        let price = req.price.filter(|p| p.value() > Decimal::ZERO);
        let stop_price = req.stop_price.filter(|p| p.value() > Decimal::ZERO);
        let callback_rate = req.callback_rate.filter(|r| *r > Decimal::ZERO);

        if order_type.requires_price() && price.is_none() {
            return Err(ExchangeError::ValidationError(format!(
                "Price is required for {} orders",
                order_type
            )));
        }
        if order_type.requires_stop_price() && stop_price.is_none() {
            return Err(ExchangeError::ValidationError(format!(
                "Stop price is required for {} orders",
                order_type
            )));
        }
        if order_type == OrderType::TrailingStopMarket && callback_rate.is_none() {
            return Err(ExchangeError::ValidationError(
                "Callback rate is required for TRAILING_STOP_MARKET orders".to_string(),
            ));
        }

        let missing = || {
            ExchangeError::ValidationError(format!("Incomplete {} order", order_type))
        };
        let tif = req.time_in_force.unwrap_or(TimeInForce::GTC);
        let kind = match order_type {
            OrderType::Market => OrderKind::Market,
            OrderType::Limit => OrderKind::Limit {
                price: price.ok_or_else(missing)?,
                time_in_force: tif,
            },
            OrderType::Stop => OrderKind::Stop {
                price: price.ok_or_else(missing)?,
                stop_price: stop_price.ok_or_else(missing)?,
                time_in_force: tif,
            },
            OrderType::StopMarket => OrderKind::StopMarket {
                stop_price: stop_price.ok_or_else(missing)?,
            },
            OrderType::TakeProfit => OrderKind::TakeProfit {
                price: price.ok_or_else(missing)?,
                stop_price: stop_price.ok_or_else(missing)?,
                time_in_force: tif,
            },
            OrderType::TakeProfitMarket => OrderKind::TakeProfitMarket {
                stop_price: stop_price.ok_or_else(missing)?,
            },
            OrderType::TrailingStopMarket => OrderKind::TrailingStopMarket {
                callback_rate: callback_rate.ok_or_else(missing)?,
                activation_price: req.activation_price,
            },
        };

        Ok(Self {
            symbol: req.symbol.trim().to_uppercase(),
            side: req.side,
            quantity: req.quantity,
            kind,
            position_side: req.position_side,
            reduce_only: req.reduce_only,
            working_type: req.working_type,
            close_position: req.close_position,
            price_protect: req.price_protect,
            new_client_order_id: req.new_client_order_id,
        })
    }
}

/// Which transport carried a write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderRoute {
    WebSocket,
    Rest,
}

/// Exchange acknowledgement of a placed or cancelled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeOrderResult {
    pub order_id: u64,
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub status: String,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub avg_price: Option<String>,
    pub update_time: i64,
    pub route: OrderRoute,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeverageSettings {
    pub symbol: String,
    pub leverage: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingRate {
    pub symbol: String,
    pub mark_price: String,
    pub funding_rate: String,
    pub next_funding_time: i64,
    pub time: i64,
}
