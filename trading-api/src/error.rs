use rust_decimal::Decimal;
use thiserror::Error;

pub type TradingResult<T> = Result<T, TradingError>;

/// Failure taxonomy shared by the gateway boundary, the planner and the ledger.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    /// Invalid or missing trading-mode / evaluator configuration. Fatal at startup.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Network or transient exchange failure. Retried by the gateway layer.
    #[error("Exchange unavailable: {0}")]
    ExchangeUnavailable(String),

    /// Authentication refused by the exchange. Never retried.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Insufficient {asset} balance: required {required}, available {available}")]
    InsufficientBalance {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    /// An adapted order still violates the market limits.
    #[error("Precision violation: {0}")]
    PrecisionViolation(String),

    /// Status polling gave up. The order keeps its last confirmed status.
    #[error("Timeout while waiting for {operation} of order {order_id}")]
    Timeout { operation: String, order_id: String },

    #[error("Unknown market: {0}")]
    UnknownMarket(String),

    #[error("Unknown order: {0}")]
    UnknownOrder(String),
}

impl TradingError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ExchangeUnavailable(msg.into())
    }

    /// Whether the gateway layer may retry the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExchangeUnavailable(_))
    }

    /// Whether the error must stop the bot rather than the current operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::InvalidCredentials(_))
    }
}
