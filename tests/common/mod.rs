//! Common test utilities and fakes

#![allow(dead_code)]

use async_trait::async_trait;
use dip_trader::common::errors::{Result, TraderError};
use dip_trader::common::traits::{HoldingsQuery, MarketDataPort, OrderPort};
use dip_trader::common::types::{Balance, OrderRecord, OrderStatus, OrderType, Symbol};
use dip_trader::OrderRequest;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

pub fn btc() -> Symbol {
    "BTC/KRW".parse().expect("valid symbol")
}

/// Price feed replaying a script, then repeating its last price
pub struct ScriptedMarket {
    script: Mutex<VecDeque<Option<Decimal>>>,
    last: Mutex<Option<Decimal>>,
    fetches: AtomicUsize,
    /// Fetches never complete
    stalled: bool,
}

impl ScriptedMarket {
    pub fn new(prices: &[Decimal]) -> Self {
        Self::with_gaps(prices.iter().copied().map(Some).collect())
    }

    /// `None` entries fail with `DataUnavailable`
    pub fn with_gaps(script: Vec<Option<Decimal>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            last: Mutex::new(None),
            fetches: AtomicUsize::new(0),
            stalled: false,
        }
    }

    /// Feed whose every fetch hangs, like a request that never gets a response
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::with_gaps(Vec::new())
        }
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataPort for ScriptedMarket {
    async fn fetch_last_price(&self, _symbol: &Symbol) -> Result<Decimal> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.stalled {
            std::future::pending::<()>().await;
        }
        let next = self.script.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(Some(price)) => {
                *last = Some(price);
                Ok(price)
            }
            Some(None) => Err(TraderError::DataUnavailable("scripted outage".to_string())),
            None => last.ok_or_else(|| TraderError::DataUnavailable("empty script".to_string())),
        }
    }
}

/// Order port that records every request and fills it in full
///
/// Market buys fill `notional / fill_price` base units.
pub struct RecordingOrders {
    fill_price: Decimal,
    placed: Mutex<Vec<OrderRequest>>,
    rejections: Mutex<VecDeque<String>>,
    latency: Duration,
}

impl RecordingOrders {
    pub fn new(fill_price: Decimal) -> Self {
        Self {
            fill_price,
            placed: Mutex::new(Vec::new()),
            rejections: Mutex::new(VecDeque::new()),
            latency: Duration::ZERO,
        }
    }

    /// Every order call takes `latency` before it returns
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// The next order is refused with `reason`
    pub fn reject_next(self, reason: &str) -> Self {
        self.rejections.lock().unwrap().push_back(reason.to_string());
        self
    }

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    async fn fill(&self, request: OrderRequest) -> Result<OrderRecord> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let side = request.side();
        let id = {
            let mut placed = self.placed.lock().unwrap();
            placed.push(request.clone());
            format!("order-{}", placed.len())
        };
        if let Some(reason) = self.rejections.lock().unwrap().pop_front() {
            return Err(TraderError::rejected(reason));
        }

        let (symbol, order_type, requested, filled, price) = match request {
            OrderRequest::MarketBuy { symbol, notional } => (
                symbol,
                OrderType::Market,
                notional,
                notional / self.fill_price,
                self.fill_price,
            ),
            OrderRequest::MarketSell { symbol, quantity } => {
                (symbol, OrderType::Market, quantity, quantity, self.fill_price)
            }
            OrderRequest::LimitBuy {
                symbol,
                quantity,
                price,
            }
            | OrderRequest::LimitSell {
                symbol,
                quantity,
                price,
            } => (symbol, OrderType::Limit, quantity, quantity, price),
        };

        Ok(OrderRecord {
            id,
            symbol,
            side,
            order_type,
            requested,
            filled_quantity: filled,
            price: Some(price),
            status: OrderStatus::Closed,
            created_at: chrono::Utc::now(),
        })
    }
}

#[async_trait]
impl OrderPort for RecordingOrders {
    async fn place_market_buy(&self, symbol: &Symbol, notional: Decimal) -> Result<OrderRecord> {
        self.fill(OrderRequest::MarketBuy {
            symbol: symbol.clone(),
            notional,
        })
        .await
    }

    async fn place_market_sell(&self, symbol: &Symbol, quantity: Decimal) -> Result<OrderRecord> {
        self.fill(OrderRequest::MarketSell {
            symbol: symbol.clone(),
            quantity,
        })
        .await
    }

    async fn place_limit_buy(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderRecord> {
        self.fill(OrderRequest::LimitBuy {
            symbol: symbol.clone(),
            quantity,
            price,
        })
        .await
    }

    async fn place_limit_sell(
        &self,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderRecord> {
        self.fill(OrderRequest::LimitSell {
            symbol: symbol.clone(),
            quantity,
            price,
        })
        .await
    }
}

/// Fixed balances
pub struct StaticHoldings {
    balances: Vec<Balance>,
    queries: AtomicUsize,
}

impl StaticHoldings {
    pub fn new(balances: &[(&str, Decimal)]) -> Self {
        Self {
            balances: balances
                .iter()
                .map(|(currency, free)| Balance {
                    currency: currency.to_string(),
                    free: *free,
                    used: Decimal::ZERO,
                })
                .collect(),
            queries: AtomicUsize::new(0),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HoldingsQuery for StaticHoldings {
    async fn get_balances(&self) -> Result<Vec<Balance>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.balances.clone())
    }
}

/// Sample Upbit API responses
pub mod upbit_responses {
    pub const TICKER: &str = r#"[{
        "market": "KRW-BTC",
        "trade_date": "20240101",
        "trade_time": "000000",
        "trade_price": 50000000,
        "timestamp": 1704067200000
    }]"#;

    pub const ACCOUNTS: &str = r#"[
        {"currency": "KRW", "balance": "1000000.0", "locked": "0.0", "avg_buy_price": "0", "avg_buy_price_modified": false, "unit_currency": "KRW"},
        {"currency": "BTC", "balance": "0.02", "locked": "0.01", "avg_buy_price": "50000000", "avg_buy_price_modified": false, "unit_currency": "KRW"}
    ]"#;

    pub const MARKET_BUY_WAIT: &str = r#"{
        "uuid": "9ca023a5-851b-4fec-9f0a-48cd83c2eaae",
        "side": "bid",
        "ord_type": "price",
        "price": "100000",
        "state": "wait",
        "market": "KRW-BTC",
        "created_at": "2024-01-01T09:00:00+09:00",
        "volume": null,
        "remaining_volume": null,
        "executed_volume": "0",
        "trades_count": 0
    }"#;

    pub const MARKET_BUY_DONE: &str = r#"{
        "uuid": "9ca023a5-851b-4fec-9f0a-48cd83c2eaae",
        "side": "bid",
        "ord_type": "price",
        "price": "100000",
        "state": "cancel",
        "market": "KRW-BTC",
        "created_at": "2024-01-01T09:00:00+09:00",
        "volume": null,
        "executed_volume": "0.002",
        "trades_count": 1,
        "trades": [
            {"market": "KRW-BTC", "uuid": "t-1", "price": "50000000", "volume": "0.002", "funds": "100000", "side": "bid"}
        ]
    }"#;

    pub const MARKET_SELL_DONE: &str = r#"{
        "uuid": "2a3e0b9f-8c1d-4a7e-9b4f-6d5c3e2a1b0c",
        "side": "ask",
        "ord_type": "market",
        "state": "done",
        "market": "KRW-BTC",
        "created_at": "2024-01-01T09:05:00+09:00",
        "volume": "0.002",
        "executed_volume": "0.002",
        "trades_count": 1,
        "trades": [
            {"market": "KRW-BTC", "uuid": "t-2", "price": "52500000", "volume": "0.002", "funds": "105000", "side": "ask"}
        ]
    }"#;

    pub const INSUFFICIENT_FUNDS: &str = r#"{
        "error": {"name": "insufficient_funds_bid", "message": "주문가능한 금액(KRW)이 부족합니다."}
    }"#;
}
