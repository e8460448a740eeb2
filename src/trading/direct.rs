//! One-shot orders outside the strategy engine

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};

use super::orders::OrderRequest;
use crate::common::errors::{Result, TraderError};
use crate::common::traits::{HoldingsQuery, OrderPort};
use crate::common::types::{Balance, OrderRecord, Symbol};

/// Immediate market/limit orders and ratio-based sizing
#[derive(Clone)]
pub struct DirectTrader {
    orders: Arc<dyn OrderPort>,
    holdings: Arc<dyn HoldingsQuery>,
}

impl DirectTrader {
    pub fn new(orders: Arc<dyn OrderPort>, holdings: Arc<dyn HoldingsQuery>) -> Self {
        Self { orders, holdings }
    }

    /// Market buy spending `amount` of the quote currency, or a limit buy of
    /// `amount` base units when `price` is given
    #[instrument(skip(self))]
    pub async fn buy(
        &self,
        symbol: &Symbol,
        amount: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderRecord> {
        positive("amount", amount)?;
        let request = match price {
            None => OrderRequest::MarketBuy {
                symbol: symbol.clone(),
                notional: amount,
            },
            Some(price) => {
                positive("price", price)?;
                OrderRequest::LimitBuy {
                    symbol: symbol.clone(),
                    quantity: amount,
                    price,
                }
            }
        };
        request.execute(self.orders.as_ref()).await
    }

    /// Sell `quantity` base units at market, or at `price` when given
    #[instrument(skip(self))]
    pub async fn sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderRecord> {
        positive("quantity", quantity)?;
        let request = match price {
            None => OrderRequest::MarketSell {
                symbol: symbol.clone(),
                quantity,
            },
            Some(price) => {
                positive("price", price)?;
                OrderRequest::LimitSell {
                    symbol: symbol.clone(),
                    quantity,
                    price,
                }
            }
        };
        request.execute(self.orders.as_ref()).await
    }

    /// Sell `ratio` (0.0 to 1.0) of the free base balance
    #[instrument(skip(self))]
    pub async fn sell_ratio(
        &self,
        symbol: &Symbol,
        ratio: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderRecord> {
        check_ratio(ratio)?;
        let available = self.available(symbol.base()).await?;
        let quantity = available * ratio;
        info!(%ratio, %available, %quantity, currency = symbol.base(), "sizing ratio sell");
        self.sell(symbol, quantity, price).await
    }

    /// Spend `ratio` (0.0 to 1.0) of the free quote balance
    ///
    /// With a limit price the notional is converted to a base quantity.
    #[instrument(skip(self))]
    pub async fn buy_ratio(
        &self,
        symbol: &Symbol,
        ratio: Decimal,
        price: Option<Decimal>,
    ) -> Result<OrderRecord> {
        check_ratio(ratio)?;
        let available = self.available(symbol.quote()).await?;
        let notional = available * ratio;
        info!(%ratio, %available, %notional, currency = symbol.quote(), "sizing ratio buy");

        match price {
            None => self.buy(symbol, notional, None).await,
            Some(price) => {
                positive("price", price)?;
                self.buy(symbol, notional / price, Some(price)).await
            }
        }
    }

    /// Every currency with a non-zero total balance
    pub async fn balances(&self) -> Result<Vec<Balance>> {
        let balances = self.holdings.get_balances().await?;
        Ok(balances
            .into_iter()
            .filter(|b| b.total() > Decimal::ZERO)
            .collect())
    }

    async fn available(&self, currency: &str) -> Result<Decimal> {
        let free = self.holdings.get_free_balance(currency).await?;
        if free <= Decimal::ZERO {
            return Err(TraderError::InvalidIntent(format!(
                "no free {} balance",
                currency
            )));
        }
        Ok(free)
    }
}

fn check_ratio(ratio: Decimal) -> Result<()> {
    if ratio < Decimal::ZERO || ratio > Decimal::ONE {
        return Err(TraderError::InvalidIntent(format!(
            "ratio must be between 0 and 1, got {}",
            ratio
        )));
    }
    Ok(())
}

fn positive(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(TraderError::InvalidIntent(format!(
            "{} must be positive, got {}",
            name, value
        )));
    }
    Ok(())
}
