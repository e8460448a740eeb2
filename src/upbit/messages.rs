//! Upbit REST payloads

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::errors::{Result, TraderError};
use crate::common::types::{OrderStatus, OrderType, Side, Symbol};

/// Upbit market code for a symbol: `BTC/KRW` → `KRW-BTC`
pub fn market_code(symbol: &Symbol) -> String {
    format!("{}-{}", symbol.quote(), symbol.base())
}

/// Ticker snapshot from `GET /v1/ticker`
#[derive(Debug, Clone, Deserialize)]
pub struct TickerResponse {
    pub market: String,
    pub trade_price: Decimal,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

/// Single row from `GET /v1/accounts`
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    pub currency: String,
    pub balance: Decimal,
    pub locked: Decimal,
    #[serde(default)]
    pub avg_buy_price: Option<Decimal>,
    #[serde(default)]
    pub unit_currency: Option<String>,
}

/// Order side on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpbitSide {
    /// Buy
    Bid,
    /// Sell
    Ask,
}

impl UpbitSide {
    fn as_str(&self) -> &'static str {
        match self {
            UpbitSide::Bid => "bid",
            UpbitSide::Ask => "ask",
        }
    }
}

impl From<UpbitSide> for Side {
    fn from(side: UpbitSide) -> Self {
        match side {
            UpbitSide::Bid => Side::Buy,
            UpbitSide::Ask => Side::Sell,
        }
    }
}

/// Order type on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpbitOrderType {
    Limit,
    /// Market buy sized by quote notional (`price` field)
    Price,
    /// Market sell sized by base volume
    Market,
    /// Anything newer than this client
    #[serde(other)]
    Other,
}

impl UpbitOrderType {
    fn as_str(&self) -> &'static str {
        match self {
            UpbitOrderType::Limit => "limit",
            UpbitOrderType::Price => "price",
            UpbitOrderType::Market => "market",
            UpbitOrderType::Other => "other",
        }
    }
}

/// Body of `POST /v1/orders`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewOrderRequest {
    pub market: String,
    pub side: UpbitSide,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    pub ord_type: UpbitOrderType,
}

impl NewOrderRequest {
    pub fn market_buy(symbol: &Symbol, notional: Decimal) -> Self {
        Self {
            market: market_code(symbol),
            side: UpbitSide::Bid,
            volume: None,
            price: Some(wire_decimal(notional)),
            ord_type: UpbitOrderType::Price,
        }
    }

    pub fn market_sell(symbol: &Symbol, quantity: Decimal) -> Self {
        Self {
            market: market_code(symbol),
            side: UpbitSide::Ask,
            volume: Some(wire_decimal(quantity)),
            price: None,
            ord_type: UpbitOrderType::Market,
        }
    }

    pub fn limit(symbol: &Symbol, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            market: market_code(symbol),
            side: match side {
                Side::Buy => UpbitSide::Bid,
                Side::Sell => UpbitSide::Ask,
            },
            volume: Some(wire_decimal(quantity)),
            price: Some(wire_decimal(price)),
            ord_type: UpbitOrderType::Limit,
        }
    }

    /// Url-encoded parameters in body order, used for the JWT query hash
    pub fn to_query(&self) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query.append_pair("market", &self.market);
        query.append_pair("side", self.side.as_str());
        if let Some(volume) = &self.volume {
            query.append_pair("volume", volume);
        }
        if let Some(price) = &self.price {
            query.append_pair("price", price);
        }
        query.append_pair("ord_type", self.ord_type.as_str());
        query.finish()
    }
}

/// Decimal without trailing zeros, as Upbit expects
fn wire_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Execution belonging to an order
#[derive(Debug, Clone, Deserialize)]
pub struct TradeFill {
    pub price: Decimal,
    pub volume: Decimal,
    pub funds: Decimal,
}

/// Order as returned by `POST /v1/orders` and `GET /v1/order`
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub uuid: String,
    pub side: UpbitSide,
    pub ord_type: UpbitOrderType,
    /// Limit price, or notional for market buys
    #[serde(default)]
    pub price: Option<Decimal>,
    /// `wait`, `watch`, `done` or `cancel`
    pub state: String,
    pub market: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub volume: Option<Decimal>,
    #[serde(default)]
    pub executed_volume: Option<Decimal>,
    #[serde(default)]
    pub trades: Vec<TradeFill>,
}

impl OrderResponse {
    pub fn status(&self) -> OrderStatus {
        match self.state.as_str() {
            "done" => OrderStatus::Closed,
            "cancel" => OrderStatus::Canceled,
            _ => OrderStatus::Open,
        }
    }

    /// No further fills can happen
    pub fn is_settled(&self) -> bool {
        self.status() != OrderStatus::Open
    }

    /// Volume-weighted fill price, when trades are attached
    pub fn average_price(&self) -> Option<Decimal> {
        let volume: Decimal = self.trades.iter().map(|t| t.volume).sum();
        if volume.is_zero() {
            return None;
        }
        let funds: Decimal = self.trades.iter().map(|t| t.funds).sum();
        Some(funds / volume)
    }

    /// Requested amount: notional for market buys, volume otherwise
    pub fn requested(&self) -> Result<Decimal> {
        let requested = match self.ord_type {
            UpbitOrderType::Price => self.price,
            _ => self.volume,
        };
        requested.ok_or_else(|| {
            TraderError::InvalidResponse(format!("order {} has no requested amount", self.uuid))
        })
    }

    pub fn order_type(&self) -> OrderType {
        match self.ord_type {
            UpbitOrderType::Limit => OrderType::Limit,
            _ => OrderType::Market,
        }
    }
}

/// Error body: `{"error": {"name": "...", "message": "..."}}`
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    pub name: String,
    #[serde(default)]
    pub message: String,
}
