//! Position lifecycle state machine shared by every strategy variant
//!
//! ```text
//!  AwaitingEntry ──trigger──▶ EntryPending ──fill──▶ Holding ──trigger──▶ ExitPending ──fill──▶ Exited
//!        │                         │                    │                      │
//!        └──────── cancel ─────────┴──── order error ───┴──────────────────────┴──▶ Failed
//! ```
//!
//! The machine never performs I/O. [`PositionMachine::observe`] consumes one
//! price sample and may return an [`OrderRequest`]; the driver places it and
//! hands the outcome back through [`PositionMachine::apply_order_result`].

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use super::result::{OpenPosition, RunFailure, RunResult};
use super::watermark::{above, below, Watermark};
use crate::common::errors::{Result, TraderError};
use crate::common::types::{OrderRecord, OrderStatus, Symbol};
use crate::trading::orders::OrderRequest;

/// How a run gets into a position
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRule {
    /// Buy once price falls `dip_percent` below the first sample
    Dip {
        notional: Decimal,
        dip_percent: Decimal,
    },
    /// Buy once price climbs `trail_percent` above its running low
    TrailingBuy {
        notional: Decimal,
        trail_percent: Decimal,
        reference_price: Option<Decimal>,
    },
    /// Position already held; the run starts in `Holding` and sells once
    /// price falls `trail_percent` below its running high
    Held {
        quantity: Decimal,
        trail_percent: Decimal,
        reference_price: Option<Decimal>,
    },
}

/// How a run gets out of a position
#[derive(Debug, Clone, PartialEq)]
pub enum ExitRule {
    /// The entry fill ends the run; held positions carry their own stop
    None,
    Fixed {
        profit_percent: Decimal,
        loss_percent: Decimal,
    },
    /// Fixed bounds plus a trailing stop that only fires above the entry price
    FixedWithTrailing {
        profit_percent: Decimal,
        loss_percent: Decimal,
        trail_percent: Decimal,
    },
}

/// Externally visible state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    AwaitingEntry,
    EntryPending,
    Holding,
    ExitPending,
    Exited,
    Failed,
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Exited | State::Failed)
    }
}

/// Which exit condition fired
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTrigger {
    Profit,
    Loss,
    TrailingStop,
}

impl std::fmt::Display for ExitTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitTrigger::Profit => write!(f, "profit_target"),
            ExitTrigger::Loss => write!(f, "stop_loss"),
            ExitTrigger::TrailingStop => write!(f, "trailing_stop"),
        }
    }
}

#[derive(Debug, Clone)]
enum EntryWatch {
    Dip {
        notional: Decimal,
        dip_percent: Decimal,
        /// Fixed from the first sample
        trigger: Option<Decimal>,
    },
    TrailingBuy {
        notional: Decimal,
        trail_percent: Decimal,
        watermark: Option<Watermark>,
    },
}

impl EntryWatch {
    fn notional(&self) -> Decimal {
        match self {
            EntryWatch::Dip { notional, .. } | EntryWatch::TrailingBuy { notional, .. } => {
                *notional
            }
        }
    }

    /// Returns true when `price` fires the entry
    fn observe(&mut self, price: Decimal) -> bool {
        match self {
            EntryWatch::Dip {
                dip_percent,
                trigger,
                ..
            } => {
                let trigger = *trigger.get_or_insert_with(|| {
                    let trigger = below(price, *dip_percent);
                    info!(reference = %price, entry_trigger = %trigger, "dip entry armed");
                    trigger
                });
                price <= trigger
            }
            EntryWatch::TrailingBuy {
                trail_percent,
                watermark,
                ..
            } => {
                match watermark {
                    Some(watermark) => {
                        if watermark.update(price) {
                            info!(low = %watermark.value(), buy_trigger = %watermark.trigger(), "new low");
                        }
                    }
                    None => {
                        let armed = Watermark::lowest(price, *trail_percent);
                        info!(low = %price, buy_trigger = %armed.trigger(), "trailing buy armed");
                        *watermark = Some(armed);
                    }
                }
                watermark
                    .as_ref()
                    .map_or(false, |watermark| price >= watermark.trigger())
            }
        }
    }

    fn trigger(&self) -> Option<Decimal> {
        match self {
            EntryWatch::Dip { trigger, .. } => *trigger,
            EntryWatch::TrailingBuy { watermark, .. } => watermark.as_ref().map(Watermark::trigger),
        }
    }
}

#[derive(Debug, Clone)]
enum ExitWatch {
    Fixed {
        profit: Decimal,
        loss: Decimal,
    },
    FixedWithTrailing {
        profit: Decimal,
        loss: Decimal,
        watermark: Watermark,
    },
    TrailingStop {
        trail_percent: Decimal,
        watermark: Option<Watermark>,
    },
}

/// An open position and its exit conditions
#[derive(Debug, Clone)]
pub struct Holding {
    quantity: Decimal,
    entry_price: Option<Decimal>,
    entry_order: Option<OrderRecord>,
    exit: ExitWatch,
}

impl Holding {
    fn entered(order: OrderRecord, entry_price: Decimal, rule: &ExitRule) -> Option<Self> {
        let exit = match *rule {
            ExitRule::None => return None,
            ExitRule::Fixed {
                profit_percent,
                loss_percent,
            } => ExitWatch::Fixed {
                profit: above(entry_price, profit_percent),
                loss: below(entry_price, loss_percent),
            },
            ExitRule::FixedWithTrailing {
                profit_percent,
                loss_percent,
                trail_percent,
            } => ExitWatch::FixedWithTrailing {
                profit: above(entry_price, profit_percent),
                loss: below(entry_price, loss_percent),
                watermark: Watermark::highest(entry_price, trail_percent),
            },
        };
        Some(Self {
            quantity: order.filled_quantity,
            entry_price: Some(entry_price),
            entry_order: Some(order),
            exit,
        })
    }

    fn held(quantity: Decimal, trail_percent: Decimal, reference_price: Option<Decimal>) -> Self {
        Self {
            quantity,
            entry_price: None,
            entry_order: None,
            exit: ExitWatch::TrailingStop {
                trail_percent,
                watermark: reference_price.map(|price| Watermark::highest(price, trail_percent)),
            },
        }
    }

    /// Evaluate exit conditions in order: profit, loss, trailing stop
    fn observe(&mut self, price: Decimal) -> Option<ExitTrigger> {
        match &mut self.exit {
            ExitWatch::Fixed { profit, loss } => {
                if price >= *profit {
                    Some(ExitTrigger::Profit)
                } else if price <= *loss {
                    Some(ExitTrigger::Loss)
                } else {
                    None
                }
            }
            ExitWatch::FixedWithTrailing {
                profit,
                loss,
                watermark,
            } => {
                if watermark.update(price) {
                    info!(high = %watermark.value(), stop = %watermark.trigger(), "new high");
                }
                let above_entry = self.entry_price.map_or(false, |entry| price > entry);
                if price >= *profit {
                    Some(ExitTrigger::Profit)
                } else if price <= *loss {
                    Some(ExitTrigger::Loss)
                } else if above_entry && price <= watermark.trigger() {
                    Some(ExitTrigger::TrailingStop)
                } else {
                    None
                }
            }
            ExitWatch::TrailingStop {
                trail_percent,
                watermark,
            } => {
                match watermark {
                    Some(watermark) => {
                        if watermark.update(price) {
                            info!(high = %watermark.value(), stop = %watermark.trigger(), "new high");
                        }
                    }
                    None => {
                        let armed = Watermark::highest(price, *trail_percent);
                        info!(high = %price, stop = %armed.trigger(), "trailing stop armed");
                        *watermark = Some(armed);
                    }
                }
                watermark
                    .as_ref()
                    .filter(|watermark| price <= watermark.trigger())
                    .map(|_| ExitTrigger::TrailingStop)
            }
        }
    }

    fn open_position(&self, symbol: &Symbol) -> OpenPosition {
        OpenPosition {
            symbol: symbol.clone(),
            quantity: self.quantity,
            entry_price: self.entry_price,
            entry_order: self.entry_order.clone(),
        }
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn entry_price(&self) -> Option<Decimal> {
        self.entry_price
    }

    pub fn profit_trigger(&self) -> Option<Decimal> {
        match &self.exit {
            ExitWatch::Fixed { profit, .. } | ExitWatch::FixedWithTrailing { profit, .. } => {
                Some(*profit)
            }
            ExitWatch::TrailingStop { .. } => None,
        }
    }

    pub fn loss_trigger(&self) -> Option<Decimal> {
        match &self.exit {
            ExitWatch::Fixed { loss, .. } | ExitWatch::FixedWithTrailing { loss, .. } => {
                Some(*loss)
            }
            ExitWatch::TrailingStop { .. } => None,
        }
    }

    /// Trailing watermark, once armed
    pub fn watermark(&self) -> Option<&Watermark> {
        match &self.exit {
            ExitWatch::Fixed { .. } => None,
            ExitWatch::FixedWithTrailing { watermark, .. } => Some(watermark),
            ExitWatch::TrailingStop { watermark, .. } => watermark.as_ref(),
        }
    }

    fn log_armed(&self) {
        info!(
            quantity = %self.quantity,
            entry_price = ?self.entry_price,
            profit_trigger = ?self.profit_trigger(),
            loss_trigger = ?self.loss_trigger(),
            stop = ?self.watermark().map(Watermark::trigger),
            "holding position"
        );
    }
}

#[derive(Debug, Clone)]
enum Phase {
    AwaitingEntry(EntryWatch),
    EntryPending {
        watch: EntryWatch,
        price: Decimal,
    },
    Holding(Holding),
    ExitPending {
        holding: Holding,
        price: Decimal,
        trigger: ExitTrigger,
    },
    Exited(OrderRecord),
    Failed(RunFailure),
}

/// One position's lifecycle
#[derive(Debug, Clone)]
pub struct PositionMachine {
    symbol: Symbol,
    exit_rule: ExitRule,
    phase: Phase,
}

impl PositionMachine {
    pub fn new(symbol: Symbol, entry: EntryRule, exit: ExitRule) -> Result<Self> {
        let phase = match entry {
            EntryRule::Dip {
                notional,
                dip_percent,
            } => Phase::AwaitingEntry(EntryWatch::Dip {
                notional,
                dip_percent,
                trigger: None,
            }),
            EntryRule::TrailingBuy {
                notional,
                trail_percent,
                reference_price,
            } => Phase::AwaitingEntry(EntryWatch::TrailingBuy {
                notional,
                trail_percent,
                watermark: reference_price.map(|price| Watermark::lowest(price, trail_percent)),
            }),
            EntryRule::Held {
                quantity,
                trail_percent,
                reference_price,
            } => {
                if exit != ExitRule::None {
                    return Err(TraderError::InvalidIntent(
                        "a held position can only be exited by its trailing stop".to_string(),
                    ));
                }
                if quantity <= Decimal::ZERO {
                    return Err(TraderError::InvalidIntent(format!(
                        "held quantity must be positive, got {}",
                        quantity
                    )));
                }
                Phase::Holding(Holding::held(quantity, trail_percent, reference_price))
            }
        };
        Ok(Self {
            symbol,
            exit_rule: exit,
            phase,
        })
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn state(&self) -> State {
        match self.phase {
            Phase::AwaitingEntry(_) => State::AwaitingEntry,
            Phase::EntryPending { .. } => State::EntryPending,
            Phase::Holding(_) => State::Holding,
            Phase::ExitPending { .. } => State::ExitPending,
            Phase::Exited(_) => State::Exited,
            Phase::Failed(_) => State::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Entry trigger price while waiting to enter
    pub fn entry_trigger(&self) -> Option<Decimal> {
        match &self.phase {
            Phase::AwaitingEntry(watch) => watch.trigger(),
            _ => None,
        }
    }

    /// The open position while holding or exiting
    pub fn holding(&self) -> Option<&Holding> {
        match &self.phase {
            Phase::Holding(holding) | Phase::ExitPending { holding, .. } => Some(holding),
            _ => None,
        }
    }

    /// Feed one price sample
    ///
    /// Returns the order to place when a trigger fires. Samples arriving
    /// while an order is pending or after a terminal state are ignored.
    pub fn observe(&mut self, price: Decimal) -> Option<OrderRequest> {
        match &mut self.phase {
            Phase::AwaitingEntry(watch) => {
                if !watch.observe(price) {
                    debug!(%price, trigger = ?watch.trigger(), "waiting for entry");
                    return None;
                }
                info!(%price, trigger = ?watch.trigger(), "entry trigger reached");
                let request = OrderRequest::MarketBuy {
                    symbol: self.symbol.clone(),
                    notional: watch.notional(),
                };
                let watch = watch.clone();
                self.phase = Phase::EntryPending { watch, price };
                Some(request)
            }
            Phase::Holding(holding) => {
                let Some(trigger) = holding.observe(price) else {
                    debug!(%price, "holding");
                    return None;
                };
                info!(%price, %trigger, "exit trigger reached");
                let request = OrderRequest::MarketSell {
                    symbol: self.symbol.clone(),
                    quantity: holding.quantity,
                };
                let holding = holding.clone();
                self.phase = Phase::ExitPending {
                    holding,
                    price,
                    trigger,
                };
                Some(request)
            }
            Phase::EntryPending { .. } | Phase::ExitPending { .. } => {
                warn!(%price, "sample ignored while an order is in flight");
                None
            }
            Phase::Exited(_) | Phase::Failed(_) => None,
        }
    }

    /// Record the outcome of the order returned by [`observe`](Self::observe)
    pub fn apply_order_result(&mut self, outcome: Result<OrderRecord>) {
        let next = match &self.phase {
            Phase::EntryPending { price, .. } => match outcome {
                Ok(order) if order.has_fill() => {
                    match Holding::entered(order.clone(), *price, &self.exit_rule) {
                        Some(holding) => {
                            holding.log_armed();
                            Phase::Holding(holding)
                        }
                        None => {
                            info!(order_id = %order.id, "entry filled, run complete");
                            Phase::Exited(order)
                        }
                    }
                }
                Ok(order) => {
                    if order.status == OrderStatus::Open {
                        warn!(order_id = %order.id, "entry order still open on the exchange");
                    }
                    Phase::Failed(RunFailure::EntryFailed {
                        reason: format!("entry order {} filled no quantity", order.id),
                        entry_order: Some(order),
                    })
                }
                Err(e) => Phase::Failed(RunFailure::EntryFailed {
                    reason: failure_reason(e),
                    entry_order: None,
                }),
            },
            Phase::ExitPending {
                holding,
                price,
                trigger,
            } => match outcome {
                Ok(order) if order.has_fill() => {
                    if let Some(entry) = holding.entry_price {
                        let pnl = (*price - entry) / entry * Decimal::ONE_HUNDRED;
                        info!(order_id = %order.id, %trigger, exit_price = %price, pnl_percent = %pnl.round_dp(2), "position closed");
                    } else {
                        info!(order_id = %order.id, %trigger, exit_price = %price, "position closed");
                    }
                    Phase::Exited(order)
                }
                Ok(order) => Phase::Failed(RunFailure::ExitFailed {
                    reason: format!("exit order {} filled no quantity", order.id),
                    position: holding.open_position(&self.symbol),
                }),
                Err(e) => Phase::Failed(RunFailure::ExitFailed {
                    reason: failure_reason(e),
                    position: holding.open_position(&self.symbol),
                }),
            },
            _ => {
                warn!(state = ?self.state(), "order result without a pending order ignored");
                return;
            }
        };

        if let Phase::Failed(failure) = &next {
            warn!(kind = failure.kind(), reason = failure.reason(), "run failed");
        }
        self.phase = next;
    }

    /// Stop a run that has not reached a terminal state
    ///
    /// An entered position is reported as still open.
    pub fn abort(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        let position = match &self.phase {
            Phase::AwaitingEntry(_) => None,
            Phase::Holding(holding) => Some(holding.open_position(&self.symbol)),
            Phase::EntryPending { .. } | Phase::ExitPending { .. } => {
                warn!("abort requested while an order is in flight; waiting for its result first");
                return;
            }
            Phase::Exited(_) | Phase::Failed(_) => return,
        };
        warn!(%reason, entered = position.is_some(), "run aborted");
        self.phase = Phase::Failed(RunFailure::Aborted { reason, position });
    }

    /// Terminal result, if reached
    pub fn result(&self) -> Option<RunResult> {
        match &self.phase {
            Phase::Exited(order) => Some(RunResult::Completed(order.clone())),
            Phase::Failed(failure) => Some(RunResult::Failed(failure.clone())),
            _ => None,
        }
    }
}

fn failure_reason(error: TraderError) -> String {
    match error {
        TraderError::OrderRejected { reason } => reason,
        other => other.to_string(),
    }
}
