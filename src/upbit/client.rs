//! Upbit client implementing the engine's ports

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::messages::{market_code, NewOrderRequest, OrderResponse, UpbitOrderType};
use super::rest::UpbitRestClient;
use crate::common::errors::{Result, TraderError};
use crate::common::traits::{HoldingsQuery, MarketDataPort, OrderPort};
use crate::common::types::{Balance, OrderRecord, Side, Symbol};
use crate::config::types::UpbitConfig;

/// Upbit REST adapter for market data, orders and holdings
#[derive(Debug, Clone)]
pub struct UpbitClient {
    rest: UpbitRestClient,
    /// Re-reads of an unsettled order after placement
    confirm_attempts: u32,
    confirm_delay: Duration,
}

impl UpbitClient {
    /// Create a client from configuration; credentials are optional for price-only use
    pub fn new(config: &UpbitConfig) -> Result<Self> {
        let rest = UpbitRestClient::with_timeout(&config.rest_url, config.request_timeout())?;
        let rest = match config.credentials() {
            Some(creds) => rest.with_credentials(creds),
            None => rest,
        };

        Ok(Self {
            rest,
            confirm_attempts: config.fill_confirm_attempts,
            confirm_delay: config.fill_confirm_delay(),
        })
    }

    async fn place(&self, symbol: &Symbol, order: NewOrderRequest) -> Result<OrderRecord> {
        let placed = self.rest.post_order(&order).await.map_err(order_error)?;
        info!(uuid = %placed.uuid, state = %placed.state, "order accepted");

        let settled = self.confirm_fill(placed).await;
        to_record(symbol, settled).map_err(order_error)
    }

    /// Re-read the order until it is done or cancelled, a bounded number of times
    ///
    /// The order exists once placement succeeded, so read failures here only
    /// leave the last known state in place.
    async fn confirm_fill(&self, mut order: OrderResponse) -> OrderResponse {
        for attempt in 1..=self.confirm_attempts {
            if order.is_settled() {
                break;
            }
            tokio::time::sleep(self.confirm_delay).await;
            match self.rest.get_order(&order.uuid).await {
                Ok(latest) => order = latest,
                Err(e) => {
                    warn!(uuid = %order.uuid, attempt, error = %e, "fill confirmation read failed")
                }
            }
        }
        if !order.is_settled() {
            warn!(uuid = %order.uuid, state = %order.state, "order not settled after confirmation");
        }
        order
    }
}

fn to_record(symbol: &Symbol, order: OrderResponse) -> Result<OrderRecord> {
    let limit_price = match order.ord_type {
        UpbitOrderType::Limit => order.price,
        _ => None,
    };
    Ok(OrderRecord {
        requested: order.requested()?,
        filled_quantity: order.executed_volume.unwrap_or(Decimal::ZERO),
        price: order.average_price().or(limit_price),
        status: order.status(),
        order_type: order.order_type(),
        side: order.side.into(),
        symbol: symbol.clone(),
        created_at: order.created_at,
        id: order.uuid,
    })
}

/// Map adapter errors onto the order port contract
///
/// Client errors from the exchange are definitive rejections carrying
/// `name: message`; everything else may have been transient.
fn order_error(error: TraderError) -> TraderError {
    match error {
        TraderError::Exchange {
            status,
            name,
            message,
        } if (400..500).contains(&status) && status != 429 => {
            TraderError::rejected(format!("{}: {}", name, message))
        }
        TraderError::Authentication(msg) => TraderError::rejected(msg),
        e @ (TraderError::OrderRejected { .. } | TraderError::OrderPortUnavailable(_)) => e,
        e => TraderError::OrderPortUnavailable(e.to_string()),
    }
}

fn data_error(error: TraderError) -> TraderError {
    match error {
        e @ TraderError::DataUnavailable(_) => e,
        e => TraderError::DataUnavailable(e.to_string()),
    }
}

#[async_trait]
impl MarketDataPort for UpbitClient {
    #[instrument(skip(self))]
    async fn fetch_last_price(&self, symbol: &Symbol) -> Result<Decimal> {
        self.rest
            .get_ticker(&market_code(symbol))
            .await
            .map_err(data_error)
    }
}

#[async_trait]
impl OrderPort for UpbitClient {
    async fn place_market_buy(&self, symbol: &Symbol, notional: Decimal) -> Result<OrderRecord> {
        self.place(symbol, NewOrderRequest::market_buy(symbol, notional))
            .await
    }

    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> Result<OrderRecord> {
        self.place(symbol, NewOrderRequest::market_sell(symbol, quantity))
            .await
    }

    async fn place_limit_buy(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderRecord> {
        self.place(symbol, NewOrderRequest::limit(symbol, Side::Buy, quantity, price))
            .await
    }

    async fn place_limit_sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderRecord> {
        self.place(symbol, NewOrderRequest::limit(symbol, Side::Sell, quantity, price))
            .await
    }
}

#[async_trait]
impl HoldingsQuery for UpbitClient {
    async fn get_balances(&self) -> Result<Vec<Balance>> {
        let accounts = self.rest.get_accounts().await?;
        Ok(accounts
            .into_iter()
            .map(|a| Balance {
                currency: a.currency,
                free: a.balance,
                used: a.locked,
            })
            .collect())
    }
}
