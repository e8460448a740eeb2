use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

use super::machine::PositionMachine;
use super::result::RunResult;
use crate::common::cancel::CancelToken;
use crate::common::errors::{Result, TraderError};
use crate::common::traits::{MarketDataPort, OrderPort};

/// Fetch → feed → sleep loop around a [`PositionMachine`]
///
/// Samples are processed one at a time in fetch order. The price fetch and
/// the sleep are cancellable; an order call, once issued, runs to completion
/// and cancellation is honored afterwards. Transient fetch errors are retried
/// on the next tick; any other fetch error aborts the run.
pub struct PollingDriver<'a> {
    market: &'a dyn MarketDataPort,
    orders: &'a dyn OrderPort,
    interval: Duration,
}

impl<'a> PollingDriver<'a> {
    pub fn new(market: &'a dyn MarketDataPort, orders: &'a dyn OrderPort, interval: Duration) -> Self {
        Self {
            market,
            orders,
            interval,
        }
    }

    /// Drive `machine` until it reaches a terminal state or `cancel` fires
    #[instrument(skip_all, fields(symbol = %machine.symbol()))]
    pub async fn run(&self, mut machine: PositionMachine, cancel: &CancelToken) -> RunResult {
        let symbol = machine.symbol().clone();
        let mut samples: u64 = 0;
        let mut failed_fetches: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                return aborted(machine, "cancelled before price fetch");
            }

            let fetched = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                fetched = self.market.fetch_last_price(&symbol) => Some(fetched),
            };
            let Some(fetched) = fetched else {
                return aborted(machine, "cancelled while fetching price");
            };

            match fetched.and_then(checked_price) {
                Ok(price) => {
                    samples += 1;
                    if let Some(request) = machine.observe(price) {
                        let outcome = request.execute(self.orders).await;
                        machine.apply_order_result(outcome);
                    }
                    if let Some(result) = machine.result() {
                        info!(samples, failed_fetches, state = ?machine.state(), "run finished");
                        return result;
                    }
                }
                Err(e) if !e.is_transient() => {
                    error!(error = %e, "price feed failed permanently");
                    return aborted(machine, &format!("price feed failed: {}", e));
                }
                Err(e) => {
                    failed_fetches += 1;
                    warn!(error = %e, retry_in = ?self.interval, "price fetch failed");
                }
            }

            let slept = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                _ = tokio::time::sleep(self.interval) => true,
            };
            if !slept {
                return aborted(machine, "cancelled while waiting for next sample");
            }
        }
    }
}

fn aborted(mut machine: PositionMachine, reason: &str) -> RunResult {
    machine.abort(reason);
    // abort only refuses while an order is in flight, which the loop never leaves behind
    machine.result().unwrap_or_else(|| {
        RunResult::Failed(super::result::RunFailure::Aborted {
            reason: reason.to_string(),
            position: None,
        })
    })
}

/// Prices must be positive; anything else is treated like a failed fetch
fn checked_price(price: Decimal) -> Result<Decimal> {
    if price <= Decimal::ZERO {
        return Err(TraderError::DataUnavailable(format!(
            "non-positive price {}",
            price
        )));
    }
    Ok(price)
}
