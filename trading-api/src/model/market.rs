//! Exchange-declared constraints of a market.

use super::symbol::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An optional `[min, max]` range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl Bounds {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_below_min(&self, value: Decimal) -> bool {
        self.min.is_some_and(|min| value < min)
    }

    pub fn is_above_max(&self, value: Decimal) -> bool {
        self.max.is_some_and(|max| value > max)
    }

    pub fn contains(&self, value: Decimal) -> bool {
        !self.is_below_min(value) && !self.is_above_max(value)
    }
}

/// Number of decimal digits accepted for prices and amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrecision {
    pub price: u32,
    pub amount: u32,
}

impl Default for MarketPrecision {
    fn default() -> Self {
        Self {
            price: 8,
            amount: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketLimits {
    pub amount: Bounds,
    pub cost: Bounds,
    pub price: Bounds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketStatus {
    pub symbol: Symbol,
    pub precision: MarketPrecision,
    pub limits: MarketLimits,
    /// Inverse markets quote quantities in the quote currency.
    #[serde(default)]
    pub inverse: bool,
}

impl MarketStatus {
    pub fn new(symbol: Symbol) -> Self {
        Self {
            symbol,
            precision: MarketPrecision::default(),
            limits: MarketLimits::default(),
            inverse: false,
        }
    }

    pub fn with_precision(mut self, price: u32, amount: u32) -> Self {
        self.precision = MarketPrecision { price, amount };
        self
    }

    pub fn with_amount_limits(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.limits.amount = Bounds::new(min, max);
        self
    }

    pub fn with_cost_limits(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.limits.cost = Bounds::new(min, max);
        self
    }

    pub fn with_price_limits(mut self, min: Option<Decimal>, max: Option<Decimal>) -> Self {
        self.limits.price = Bounds::new(min, max);
        self
    }

    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }
}
