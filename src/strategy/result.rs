use rust_decimal::Decimal;
use serde::Serialize;

use crate::common::types::{OrderRecord, OrderStatus, Symbol};

/// A position the engine entered (or was handed) and did not close
///
/// Carried by failures that leave holdings behind so an operator can act on them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpenPosition {
    pub symbol: Symbol,
    pub quantity: Decimal,
    /// Sampled price that fired the entry; `None` for positions held before the run
    pub entry_price: Option<Decimal>,
    pub entry_order: Option<OrderRecord>,
}

/// Why a run ended without completing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunFailure {
    /// The entry order failed; nothing is held
    ///
    /// `entry_order` is set when the exchange accepted the order but reported
    /// no fill. An order still open there can fill after the run ends.
    EntryFailed {
        reason: String,
        entry_order: Option<OrderRecord>,
    },
    /// The exit order failed; the position is still open
    ExitFailed {
        reason: String,
        position: OpenPosition,
    },
    /// Cancelled by the caller, or stopped by a price feed error that will not
    /// clear on retry; `position` is set when the run had entered
    Aborted {
        reason: String,
        position: Option<OpenPosition>,
    },
}

impl RunFailure {
    /// Stable tag for the failure kind
    pub fn kind(&self) -> &'static str {
        match self {
            RunFailure::EntryFailed { .. } => "entry_failed",
            RunFailure::ExitFailed { .. } => "exit_failed",
            RunFailure::Aborted { .. } => "aborted",
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            RunFailure::EntryFailed { reason, .. }
            | RunFailure::ExitFailed { reason, .. }
            | RunFailure::Aborted { reason, .. } => reason,
        }
    }

    /// Holdings left behind that need operator attention
    pub fn open_position(&self) -> Option<&OpenPosition> {
        match self {
            RunFailure::EntryFailed { .. } => None,
            RunFailure::ExitFailed { position, .. } => Some(position),
            RunFailure::Aborted { position, .. } => position.as_ref(),
        }
    }

    /// Entry order still resting on the exchange after the run gave up on it
    pub fn live_order(&self) -> Option<&OrderRecord> {
        match self {
            RunFailure::EntryFailed {
                entry_order: Some(order),
                ..
            } if order.status == OrderStatus::Open => Some(order),
            _ => None,
        }
    }

    /// Whether the failure left anything for an operator to act on
    pub fn needs_attention(&self) -> bool {
        self.open_position().is_some() || self.live_order().is_some()
    }
}

impl std::fmt::Display for RunFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind(), self.reason())
    }
}

/// Terminal output of a strategy run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunResult {
    /// The closing order: the exit sell, or the entry buy for entry-only runs
    Completed(OrderRecord),
    Failed(RunFailure),
}

impl RunResult {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunResult::Completed(_))
    }

    pub fn order(&self) -> Option<&OrderRecord> {
        match self {
            RunResult::Completed(order) => Some(order),
            RunResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RunFailure> {
        match self {
            RunResult::Completed(_) => None,
            RunResult::Failed(failure) => Some(failure),
        }
    }
}
