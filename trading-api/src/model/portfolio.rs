use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance of one asset: what is owned and what is not yet reserved by open
/// orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioEntry {
    pub available: Decimal,
    pub total: Decimal,
}

impl PortfolioEntry {
    pub fn new(available: Decimal, total: Decimal) -> Self {
        Self { available, total }
    }

    /// Entry with nothing reserved.
    pub fn free(amount: Decimal) -> Self {
        Self::new(amount, amount)
    }

    pub fn reserved(&self) -> Decimal {
        self.total - self.available
    }

    pub fn scaled(&self, factor: Decimal) -> Self {
        Self::new(self.available * factor, self.total * factor)
    }
}
