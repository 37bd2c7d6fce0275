use serde::{Deserialize, Serialize};
use std::fmt;

/// Discrete trading intent produced by the state decider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingState {
    VeryLong,
    Long,
    #[default]
    Neutral,
    Short,
    VeryShort,
}

impl TradingState {
    /// True for the states that sell the base currency.
    pub fn is_selling(&self) -> bool {
        matches!(self, TradingState::Short | TradingState::VeryShort)
    }

    /// True for the states that spend the quote currency.
    pub fn is_buying(&self) -> bool {
        matches!(self, TradingState::Long | TradingState::VeryLong)
    }
}

impl fmt::Display for TradingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradingState::VeryLong => "VERY_LONG",
            TradingState::Long => "LONG",
            TradingState::Neutral => "NEUTRAL",
            TradingState::Short => "SHORT",
            TradingState::VeryShort => "VERY_SHORT",
        };
        f.write_str(name)
    }
}
