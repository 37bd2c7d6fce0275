//! Trading pair identity.

use crate::error::TradingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A spot trading pair such as `BTC/USDT`.
///
/// `base` is the traded currency, `quote` the market it is priced in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol {
    base: String,
    quote: String,
}

impl Symbol {
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
        }
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    pub fn quote(&self) -> &str {
        &self.quote
    }

    /// Returns `(currency, market)`.
    pub fn split(&self) -> (&str, &str) {
        (&self.base, &self.quote)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

impl FromStr for Symbol {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, quote)) if !base.is_empty() && !quote.is_empty() && !quote.contains('/') => {
                Ok(Self::new(base, quote))
            }
            _ => Err(TradingError::config(format!("Malformed symbol '{}'", s))),
        }
    }
}

impl TryFrom<String> for Symbol {
    type Error = TradingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let symbol: Symbol = "BTC/USDT".parse().unwrap();
        assert_eq!(symbol.split(), ("BTC", "USDT"));
        assert_eq!(symbol.to_string(), "BTC/USDT");
    }

    #[test]
    fn test_malformed_symbols() {
        assert!("BTCUSDT".parse::<Symbol>().is_err());
        assert!("/USDT".parse::<Symbol>().is_err());
        assert!("A/B/C".parse::<Symbol>().is_err());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Symbol::new("ETH", "BTC")).unwrap();
        assert_eq!(json, "\"ETH/BTC\"");
        let back: Symbol = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Symbol::new("ETH", "BTC"));
    }
}
