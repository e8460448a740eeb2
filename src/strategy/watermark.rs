use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which extreme a watermark follows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Highest price seen; trigger sits below it (sell-side trailing stop)
    Highest,
    /// Lowest price seen; trigger sits above it (buy-side trailing entry)
    Lowest,
}

/// Running extreme price plus the trigger derived from it
///
/// The trigger is recomputed inside [`Watermark::update`] whenever the
/// extreme moves, so reading [`Watermark::trigger`] after an update never
/// returns a stale value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    direction: Direction,
    percent: Decimal,
    value: Decimal,
    trigger: Decimal,
}

impl Watermark {
    pub fn new(direction: Direction, initial: Decimal, percent: Decimal) -> Self {
        Self {
            direction,
            percent,
            value: initial,
            trigger: trigger_for(direction, initial, percent),
        }
    }

    /// Sell-side watermark tracking the high since `initial`
    pub fn highest(initial: Decimal, percent: Decimal) -> Self {
        Self::new(Direction::Highest, initial, percent)
    }

    /// Buy-side watermark tracking the low since `initial`
    pub fn lowest(initial: Decimal, percent: Decimal) -> Self {
        Self::new(Direction::Lowest, initial, percent)
    }

    /// Feed a sampled price. Returns whether the watermark moved.
    pub fn update(&mut self, price: Decimal) -> bool {
        let more_extreme = match self.direction {
            Direction::Highest => price > self.value,
            Direction::Lowest => price < self.value,
        };
        if more_extreme {
            self.value = price;
            self.trigger = trigger_for(self.direction, price, self.percent);
        }
        more_extreme
    }

    pub fn value(&self) -> Decimal {
        self.value
    }

    pub fn trigger(&self) -> Decimal {
        self.trigger
    }
}

fn trigger_for(direction: Direction, value: Decimal, percent: Decimal) -> Decimal {
    match direction {
        Direction::Highest => below(value, percent),
        Direction::Lowest => above(value, percent),
    }
}

/// `price × (1 − percent/100)`
pub fn below(price: Decimal, percent: Decimal) -> Decimal {
    price * (Decimal::ONE - percent / Decimal::ONE_HUNDRED)
}

/// `price × (1 + percent/100)`
pub fn above(price: Decimal, percent: Decimal) -> Decimal {
    price * (Decimal::ONE + percent / Decimal::ONE_HUNDRED)
}
