use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, instrument};

use super::driver::PollingDriver;
use super::intent::{PositionIntent, StrategyVariant};
use super::machine::{EntryRule, ExitRule, PositionMachine};
use super::result::RunResult;
use crate::common::cancel::CancelToken;
use crate::common::errors::{Result, TraderError};
use crate::common::traits::{HoldingsQuery, MarketDataPort, OrderPort};

/// Entry points for every strategy variant
///
/// Each `run_*` call validates its intent, builds a fresh
/// [`PositionMachine`] and drives it to completion. Runs share nothing
/// mutable, so one runner can execute many runs concurrently.
///
/// `Err` is returned only when the run could not start (invalid intent or
/// failed holdings lookup); no order has been placed in that case. Every
/// outcome after the loop starts is a [`RunResult`].
#[derive(Clone)]
pub struct StrategyRunner {
    market: Arc<dyn MarketDataPort>,
    orders: Arc<dyn OrderPort>,
    holdings: Arc<dyn HoldingsQuery>,
}

impl StrategyRunner {
    pub fn new(
        market: Arc<dyn MarketDataPort>,
        orders: Arc<dyn OrderPort>,
        holdings: Arc<dyn HoldingsQuery>,
    ) -> Self {
        Self {
            market,
            orders,
            holdings,
        }
    }

    /// Runner backed by a single client implementing all three ports
    pub fn from_client<C>(client: Arc<C>) -> Self
    where
        C: MarketDataPort + OrderPort + HoldingsQuery + 'static,
    {
        Self {
            market: client.clone(),
            orders: client.clone(),
            holdings: client,
        }
    }

    /// Dispatch to the entry point for `variant`
    pub async fn run(
        &self,
        variant: StrategyVariant,
        intent: &PositionIntent,
        cancel: CancelToken,
    ) -> Result<RunResult> {
        match variant {
            StrategyVariant::DipFixedExit => self.run_dip_fixed_exit(intent, cancel).await,
            StrategyVariant::DipTrailingExit => self.run_dip_trailing_exit(intent, cancel).await,
            StrategyVariant::TrailingStopExit => self.run_trailing_stop_exit(intent, cancel).await,
            StrategyVariant::TrailingBuyEntry => self.run_trailing_buy_entry(intent, cancel).await,
        }
    }

    /// Buy a dip from the first sampled price, sell at a fixed profit or loss
    #[instrument(skip_all, fields(symbol = %intent.symbol))]
    pub async fn run_dip_fixed_exit(
        &self,
        intent: &PositionIntent,
        cancel: CancelToken,
    ) -> Result<RunResult> {
        intent.validate(StrategyVariant::DipFixedExit)?;
        let machine = PositionMachine::new(
            intent.symbol.clone(),
            EntryRule::Dip {
                notional: intent.required_notional()?,
                dip_percent: intent.dip_percent,
            },
            ExitRule::Fixed {
                profit_percent: intent.profit_percent,
                loss_percent: intent.loss_percent,
            },
        )?;
        Ok(self.drive(StrategyVariant::DipFixedExit, machine, intent, &cancel).await)
    }

    /// Dip entry with fixed bounds plus a trailing stop that protects gains
    #[instrument(skip_all, fields(symbol = %intent.symbol))]
    pub async fn run_dip_trailing_exit(
        &self,
        intent: &PositionIntent,
        cancel: CancelToken,
    ) -> Result<RunResult> {
        intent.validate(StrategyVariant::DipTrailingExit)?;
        let machine = PositionMachine::new(
            intent.symbol.clone(),
            EntryRule::Dip {
                notional: intent.required_notional()?,
                dip_percent: intent.dip_percent,
            },
            ExitRule::FixedWithTrailing {
                profit_percent: intent.profit_percent,
                loss_percent: intent.loss_percent,
                trail_percent: intent.trailing_percent,
            },
        )?;
        Ok(self.drive(StrategyVariant::DipTrailingExit, machine, intent, &cancel).await)
    }

    /// Trailing stop on a position already held
    ///
    /// The quantity comes from the intent or, when absent, is read once
    /// from the free balance of the base currency.
    #[instrument(skip_all, fields(symbol = %intent.symbol))]
    pub async fn run_trailing_stop_exit(
        &self,
        intent: &PositionIntent,
        cancel: CancelToken,
    ) -> Result<RunResult> {
        intent.validate(StrategyVariant::TrailingStopExit)?;

        let quantity = match intent.quantity {
            Some(quantity) => quantity,
            None => {
                let currency = intent.symbol.base();
                let free = self.holdings.get_free_balance(currency).await?;
                info!(%currency, %free, "quantity read from holdings");
                if free <= Decimal::ZERO {
                    return Err(TraderError::InvalidIntent(format!(
                        "no free {} balance to protect",
                        currency
                    )));
                }
                free
            }
        };

        let machine = PositionMachine::new(
            intent.symbol.clone(),
            EntryRule::Held {
                quantity,
                trail_percent: intent.trailing_percent,
                reference_price: intent.reference_price,
            },
            ExitRule::None,
        )?;
        Ok(self.drive(StrategyVariant::TrailingStopExit, machine, intent, &cancel).await)
    }

    /// Buy once price rebounds `trailing_percent` off its running low
    #[instrument(skip_all, fields(symbol = %intent.symbol))]
    pub async fn run_trailing_buy_entry(
        &self,
        intent: &PositionIntent,
        cancel: CancelToken,
    ) -> Result<RunResult> {
        intent.validate(StrategyVariant::TrailingBuyEntry)?;
        let machine = PositionMachine::new(
            intent.symbol.clone(),
            EntryRule::TrailingBuy {
                notional: intent.required_notional()?,
                trail_percent: intent.trailing_percent,
                reference_price: intent.reference_price,
            },
            ExitRule::None,
        )?;
        Ok(self.drive(StrategyVariant::TrailingBuyEntry, machine, intent, &cancel).await)
    }

    async fn drive(
        &self,
        variant: StrategyVariant,
        machine: PositionMachine,
        intent: &PositionIntent,
        cancel: &CancelToken,
    ) -> RunResult {
        info!(%variant, interval = ?intent.poll_interval, "starting run");
        PollingDriver::new(self.market.as_ref(), self.orders.as_ref(), intent.poll_interval)
            .run(machine, cancel)
            .await
    }
}
