//! Port traits the engine consumes
//!
//! Strategies never talk to an exchange directly. They go through these
//! ports so runs can be driven by the Upbit adapter in production and by
//! fakes in tests.

use async_trait::async_trait;
use rust_decimal::Decimal;

#[cfg(test)]
use mockall::automock;

use super::errors::Result;
use super::types::{Balance, OrderRecord, Symbol};

/// Source of the latest traded price
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Fetch the last traded price for a symbol
    ///
    /// Fails with `TraderError::DataUnavailable` on network/exchange errors.
    async fn fetch_last_price(&self, symbol: &Symbol) -> Result<Decimal>;
}

/// Order placement
///
/// Every method returns a confirmed order record, or fails with
/// `TraderError::OrderRejected` (definitive) or
/// `TraderError::OrderPortUnavailable` (transient). Callers never retry
/// an order blindly.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait OrderPort: Send + Sync {
    /// Market buy spending `notional` of the quote currency
    async fn place_market_buy(&self, symbol: &Symbol, notional: Decimal) -> Result<OrderRecord>;

    /// Market sell of `quantity` base units
    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> Result<OrderRecord>;

    /// Limit buy of `quantity` base units at `price`
    async fn place_limit_buy(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderRecord>;

    /// Limit sell of `quantity` base units at `price`
    async fn place_limit_sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderRecord>;
}

/// Account holdings
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HoldingsQuery: Send + Sync {
    /// All currencies with a non-zero balance
    async fn get_balances(&self) -> Result<Vec<Balance>>;

    /// Free (unlocked) amount of one currency, zero when not held
    async fn get_free_balance(&self, currency: &str) -> Result<Decimal> {
        let balances = self.get_balances().await?;
        Ok(balances
            .iter()
            .find(|b| b.currency.eq_ignore_ascii_case(currency))
            .map(|b| b.free)
            .unwrap_or_default())
    }
}
