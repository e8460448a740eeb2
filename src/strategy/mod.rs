//! Price-driven order execution engine
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  StrategyRunner                                             │
//! │    - Validates the PositionIntent                           │
//! │    - Builds a PositionMachine for the requested variant     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │  PollingDriver (one sequential loop per run)                │
//! │    fetch price ──▶ machine.observe(price)                   │
//! │         ▲                  │ (trigger fired)                │
//! │         │                  ▼                                │
//! │       sleep           OrderPort ──▶ machine.apply_order_... │
//! │         │                  │                                │
//! │         └──── not terminal ┘──── terminal ──▶ RunResult     │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`PositionIntent`]: Immutable parameters of one run
//! - [`Watermark`]: Running extreme price and its derived trigger
//! - [`PositionMachine`]: Entry/exit state machine built from an
//!   [`EntryRule`] and an [`ExitRule`]
//! - [`PollingDriver`]: Cancellable fetch/feed/sleep loop
//! - [`StrategyRunner`]: `run_dip_fixed_exit`, `run_dip_trailing_exit`,
//!   `run_trailing_stop_exit`, `run_trailing_buy_entry`
//!
//! # Example
//!
//! ```ignore
//! let runner = StrategyRunner::from_client(Arc::new(upbit_client));
//! let intent = PositionIntent::new("BTC/KRW".parse()?)
//!     .with_notional(dec!(100000))
//!     .with_dip_percent(dec!(1.0));
//!
//! let (handle, token) = cancellation();
//! match runner.run_dip_fixed_exit(&intent, token).await? {
//!     RunResult::Completed(order) => println!("closed with order {}", order.id),
//!     RunResult::Failed(failure) => eprintln!("run failed: {}", failure),
//! }
//! ```

mod driver;
mod intent;
mod machine;
mod result;
mod runner;
mod watermark;

pub use driver::PollingDriver;
pub use intent::{PositionIntent, StrategyVariant};
pub use machine::{EntryRule, ExitRule, ExitTrigger, Holding, PositionMachine, State};
pub use result::{OpenPosition, RunFailure, RunResult};
pub use runner::StrategyRunner;
pub use watermark::{above, below, Direction, Watermark};
