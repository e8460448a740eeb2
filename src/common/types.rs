//! Exchange-neutral types shared by the engine and the adapters

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{Result, TraderError};

/// A tradable pair such as `BTC/KRW`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    /// Create a symbol from its base and quote currencies
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Result<Self> {
        let base = base.into().trim().to_uppercase();
        let quote = quote.into().trim().to_uppercase();
        if base.is_empty() || quote.is_empty() {
            return Err(TraderError::InvalidIntent(format!(
                "symbol needs both base and quote currency, got '{}/{}'",
                base, quote
            )));
        }
        Ok(Self { base, quote })
    }

    /// Currency being bought or sold (the held asset)
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Currency the price is denominated in
    pub fn quote(&self) -> &str {
        &self.quote
    }
}

impl FromStr for Symbol {
    type Err = TraderError;

    fn from_str(s: &str) -> Result<Self> {
        match s.split_once('/') {
            Some((base, quote)) if !quote.contains('/') => Symbol::new(base, quote),
            _ => Err(TraderError::InvalidIntent(format!(
                "symbol must look like BASE/QUOTE, got '{}'",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = TraderError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

impl std::fmt::Display for Symbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// How the order is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// Lifecycle status reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted, waiting to (fully) fill
    Open,
    /// Completely filled
    Closed,
    /// Cancelled, possibly after a partial fill
    Canceled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Open => write!(f, "open"),
            OrderStatus::Closed => write!(f, "closed"),
            OrderStatus::Canceled => write!(f, "canceled"),
        }
    }
}

/// Confirmed order returned by an order port
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Exchange order identifier
    pub id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub order_type: OrderType,
    /// Requested amount: quote notional for market buys, base quantity otherwise
    pub requested: Decimal,
    /// Base quantity filled so far
    pub filled_quantity: Decimal,
    /// Limit price, or average fill price when the exchange reports one
    pub price: Option<Decimal>,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl OrderRecord {
    /// Returns true if some quantity was executed
    pub fn has_fill(&self) -> bool {
        self.filled_quantity > Decimal::ZERO
    }
}

/// Holding of a single currency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub currency: String,
    /// Available for new orders
    pub free: Decimal,
    /// Locked in open orders
    pub used: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_parsing() {
        let symbol: Symbol = "ctc/krw".parse().unwrap();
        assert_eq!(symbol.base(), "CTC");
        assert_eq!(symbol.quote(), "KRW");
        assert_eq!(symbol.to_string(), "CTC/KRW");
    }

    #[test]
    fn test_symbol_rejects_malformed_input() {
        assert!("BTCKRW".parse::<Symbol>().is_err());
        assert!("/KRW".parse::<Symbol>().is_err());
        assert!("BTC/".parse::<Symbol>().is_err());
        assert!("A/B/C".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_symbol_serde_as_string() {
        let symbol: Symbol = "BTC/KRW".parse().unwrap();
        let json = serde_json::to_string(&symbol).unwrap();
        assert_eq!(json, "\"BTC/KRW\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, symbol);
    }

    #[test]
    fn test_balance_total() {
        let balance = Balance {
            currency: "KRW".to_string(),
            free: dec!(150000),
            used: dec!(50000),
        };
        assert_eq!(balance.total(), dec!(200000));
    }
}
