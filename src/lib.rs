//! DipTrader Library
//!
//! Price-triggered order execution for the Upbit exchange: dip entries with
//! fixed or trailing exits, trailing stops on held positions and trailing
//! buys, driven by a cancellable polling loop.

pub mod common;
pub mod config;
pub mod strategy;
pub mod trading;
pub mod upbit;

// Re-export commonly used types
pub use common::cancel::{cancellation, CancelHandle, CancelToken};
pub use common::errors::{Result, TraderError};
pub use common::traits::{HoldingsQuery, MarketDataPort, OrderPort};
pub use common::types::{Balance, OrderRecord, OrderStatus, OrderType, Side, Symbol};
pub use config::types::AppConfig;
pub use trading::{DirectTrader, OrderRequest};
pub use upbit::client::UpbitClient;
pub use upbit::rest::UpbitRestClient;

// Strategy types
pub use strategy::{
    EntryRule, ExitRule, ExitTrigger, OpenPosition, PollingDriver, PositionIntent,
    PositionMachine, RunFailure, RunResult, State, StrategyRunner, StrategyVariant,
};
