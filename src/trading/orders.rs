use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::common::errors::Result;
use crate::common::traits::OrderPort;
use crate::common::types::{OrderRecord, Side, Symbol};

/// An order the engine wants placed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRequest {
    /// Spend `notional` of the quote currency at market
    MarketBuy { symbol: Symbol, notional: Decimal },
    /// Sell `quantity` base units at market
    MarketSell { symbol: Symbol, quantity: Decimal },
    LimitBuy {
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
    },
    LimitSell {
        symbol: Symbol,
        quantity: Decimal,
        price: Decimal,
    },
}

impl OrderRequest {
    pub fn symbol(&self) -> &Symbol {
        match self {
            OrderRequest::MarketBuy { symbol, .. }
            | OrderRequest::MarketSell { symbol, .. }
            | OrderRequest::LimitBuy { symbol, .. }
            | OrderRequest::LimitSell { symbol, .. } => symbol,
        }
    }

    pub fn side(&self) -> Side {
        match self {
            OrderRequest::MarketBuy { .. } | OrderRequest::LimitBuy { .. } => Side::Buy,
            OrderRequest::MarketSell { .. } | OrderRequest::LimitSell { .. } => Side::Sell,
        }
    }

    /// Place the order exactly once
    ///
    /// Failures are logged and returned as-is; retrying is the caller's decision.
    pub async fn execute(&self, orders: &dyn OrderPort) -> Result<OrderRecord> {
        info!(order = %self, "placing order");
        let placed = match self {
            OrderRequest::MarketBuy { symbol, notional } => {
                orders.place_market_buy(symbol, *notional).await
            }
            OrderRequest::MarketSell { symbol, quantity } => {
                orders.place_market_sell(symbol, *quantity).await
            }
            OrderRequest::LimitBuy {
                symbol,
                quantity,
                price,
            } => orders.place_limit_buy(symbol, *quantity, *price).await,
            OrderRequest::LimitSell {
                symbol,
                quantity,
                price,
            } => orders.place_limit_sell(symbol, *quantity, *price).await,
        };

        match &placed {
            Ok(record) => info!(
                order_id = %record.id,
                status = %record.status,
                filled = %record.filled_quantity,
                "order confirmed"
            ),
            Err(e) => warn!(order = %self, error = %e, "order failed"),
        }
        placed
    }
}

impl std::fmt::Display for OrderRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderRequest::MarketBuy { symbol, notional } => {
                write!(f, "market buy {} for {} {}", symbol, notional, symbol.quote())
            }
            OrderRequest::MarketSell { symbol, quantity } => {
                write!(f, "market sell {} {}", quantity, symbol.base())
            }
            OrderRequest::LimitBuy {
                symbol,
                quantity,
                price,
            } => write!(f, "limit buy {} {} @ {}", quantity, symbol.base(), price),
            OrderRequest::LimitSell {
                symbol,
                quantity,
                price,
            } => write!(f, "limit sell {} {} @ {}", quantity, symbol.base(), price),
        }
    }
}
