use super::order::{Fee, OrderStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Raw order snapshot returned by an exchange gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    /// Identifier assigned by the exchange, when it acknowledged the order.
    pub exchange_id: Option<String>,
    /// Status as last reported by the exchange.
    pub status: OrderStatus,
    /// Total quantity filled so far.
    pub filled_quantity: Decimal,
    /// Average fill price.
    pub filled_price: Decimal,
    pub fee: Option<Fee>,
    /// Timestamp of the report (unix millis).
    pub timestamp: i64,
    /// Optional rejection reason or message.
    pub message: Option<String>,
}

impl ExecutionReport {
    pub fn new(exchange_id: Option<String>, status: OrderStatus, timestamp: i64) -> Self {
        Self {
            exchange_id,
            status,
            filled_quantity: Decimal::ZERO,
            filled_price: Decimal::ZERO,
            fee: None,
            timestamp,
            message: None,
        }
    }

    pub fn with_fill(mut self, quantity: Decimal, price: Decimal) -> Self {
        self.filled_quantity = quantity;
        self.filled_price = price;
        self
    }

    pub fn with_fee(mut self, fee: Fee) -> Self {
        self.fee = Some(fee);
        self
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }
}
