use super::order::{Fee, Order, OrderKind, OrderStatus, Side};
use super::symbol::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Immutable record of an order that reached a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    order_id: Uuid,
    exchange: String,
    symbol: Symbol,
    side: Side,
    kind: OrderKind,
    quantity: Decimal,
    price: Decimal,
    fee: Option<Fee>,
    final_status: OrderStatus,
    created_at: i64,
    canceled_at: Option<i64>,
    filled_at: Option<i64>,
    simulated: bool,
}

impl Trade {
    pub fn from_order(exchange: impl Into<String>, order: &Order) -> Self {
        Self {
            order_id: order.id(),
            exchange: exchange.into(),
            symbol: order.symbol().clone(),
            side: order.side(),
            kind: order.kind(),
            quantity: order.filled_quantity(),
            price: order.filled_price(),
            fee: order.fee().cloned(),
            final_status: order.status(),
            created_at: order.created_at(),
            canceled_at: order.canceled_at(),
            filled_at: order.filled_at(),
            simulated: order.is_simulated(),
        }
    }

    pub fn order_id(&self) -> Uuid {
        self.order_id
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn currency(&self) -> &str {
        self.symbol.base()
    }

    pub fn market(&self) -> &str {
        self.symbol.quote()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn fee(&self) -> Option<&Fee> {
        self.fee.as_ref()
    }

    pub fn final_status(&self) -> OrderStatus {
        self.final_status
    }

    pub fn created_at(&self) -> i64 {
        self.created_at
    }

    pub fn canceled_at(&self) -> Option<i64> {
        self.canceled_at
    }

    pub fn filled_at(&self) -> Option<i64> {
        self.filled_at
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }
}
