use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::errors::{Result, TraderError};
use crate::common::types::Symbol;

/// The strategy variants a run can execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyVariant {
    /// Buy on a dip from the first sampled price, exit on fixed profit/loss
    DipFixedExit,
    /// Dip entry, fixed profit/loss exit plus a trailing stop above entry
    DipTrailingExit,
    /// Trailing stop on a position that is already held
    TrailingStopExit,
    /// Buy once price rebounds off its running low
    TrailingBuyEntry,
}

impl std::fmt::Display for StrategyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyVariant::DipFixedExit => write!(f, "dip_fixed_exit"),
            StrategyVariant::DipTrailingExit => write!(f, "dip_trailing_exit"),
            StrategyVariant::TrailingStopExit => write!(f, "trailing_stop_exit"),
            StrategyVariant::TrailingBuyEntry => write!(f, "trailing_buy_entry"),
        }
    }
}

/// Parameters of one strategy run
///
/// Immutable once the run starts. Each variant reads only the fields it
/// needs; [`PositionIntent::validate`] checks those before any price is
/// fetched or order placed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionIntent {
    pub symbol: Symbol,
    /// Quote-currency amount to spend on entry (buy-side variants)
    pub notional: Option<Decimal>,
    /// Base quantity to protect (trailing stop); `None` reads the free balance
    pub quantity: Option<Decimal>,
    pub dip_percent: Decimal,
    pub profit_percent: Decimal,
    pub loss_percent: Decimal,
    pub trailing_percent: Decimal,
    /// Initial watermark for the trailing variants; `None` uses the first sample
    pub reference_price: Option<Decimal>,
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
}

impl PositionIntent {
    /// Intent for `symbol` with the default percentages (1% dip, +5% / -3%, 1% trail)
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            notional: None,
            quantity: None,
            dip_percent: dec!(1.0),
            profit_percent: dec!(5.0),
            loss_percent: dec!(3.0),
            trailing_percent: dec!(1.0),
            reference_price: None,
            poll_interval: Duration::from_secs(1),
        }
    }

    pub fn with_notional(mut self, notional: Decimal) -> Self {
        self.notional = Some(notional);
        self
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }

    pub fn with_dip_percent(mut self, percent: Decimal) -> Self {
        self.dip_percent = percent;
        self
    }

    pub fn with_profit_percent(mut self, percent: Decimal) -> Self {
        self.profit_percent = percent;
        self
    }

    pub fn with_loss_percent(mut self, percent: Decimal) -> Self {
        self.loss_percent = percent;
        self
    }

    pub fn with_trailing_percent(mut self, percent: Decimal) -> Self {
        self.trailing_percent = percent;
        self
    }

    pub fn with_reference_price(mut self, price: Decimal) -> Self {
        self.reference_price = Some(price);
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Check the fields `variant` relies on
    pub fn validate(&self, variant: StrategyVariant) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(invalid("poll interval must be greater than zero"));
        }
        if let Some(price) = self.reference_price {
            positive("reference price", price)?;
        }

        match variant {
            StrategyVariant::DipFixedExit | StrategyVariant::DipTrailingExit => {
                self.required_notional()?;
                percent("dip", self.dip_percent, Bound::ZeroAllowed)?;
                positive("profit percent", self.profit_percent)?;
                percent("loss", self.loss_percent, Bound::Positive)?;
                if variant == StrategyVariant::DipTrailingExit {
                    percent("trailing", self.trailing_percent, Bound::Positive)?;
                }
            }
            StrategyVariant::TrailingStopExit => {
                percent("trailing", self.trailing_percent, Bound::Positive)?;
                if let Some(quantity) = self.quantity {
                    positive("quantity", quantity)?;
                }
            }
            StrategyVariant::TrailingBuyEntry => {
                self.required_notional()?;
                positive("trailing percent", self.trailing_percent)?;
            }
        }
        Ok(())
    }

    /// Entry notional, required by every buy-side variant
    pub(crate) fn required_notional(&self) -> Result<Decimal> {
        let notional = self
            .notional
            .ok_or_else(|| invalid("an entry notional is required"))?;
        positive("notional", notional)?;
        Ok(notional)
    }
}

#[derive(Clone, Copy)]
enum Bound {
    ZeroAllowed,
    Positive,
}

/// Percentages that shrink a price must stay below 100
fn percent(name: &str, value: Decimal, bound: Bound) -> Result<()> {
    let (lower_ok, range) = match bound {
        Bound::ZeroAllowed => (value >= Decimal::ZERO, "[0, 100)"),
        Bound::Positive => (value > Decimal::ZERO, "(0, 100)"),
    };
    if !lower_ok || value >= Decimal::ONE_HUNDRED {
        return Err(invalid(format!(
            "{} percent must be within {}, got {}",
            name, range, value
        )));
    }
    Ok(())
}

fn positive(name: &str, value: Decimal) -> Result<()> {
    if value <= Decimal::ZERO {
        return Err(invalid(format!("{} must be positive, got {}", name, value)));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> TraderError {
    TraderError::InvalidIntent(message.into())
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
