use super::execution::ExecutionReport;
use super::symbol::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("BUY"),
            Side::Sell => f.write_str("SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Market,
    Limit,
    StopLoss,
    StopLossLimit,
    TakeProfit,
    TakeProfitLimit,
}

impl OrderKind {
    /// Contingent orders protect a primary order and never reserve balance.
    pub fn is_contingent(&self) -> bool {
        matches!(
            self,
            OrderKind::StopLoss
                | OrderKind::StopLossLimit
                | OrderKind::TakeProfit
                | OrderKind::TakeProfitLimit
        )
    }

    pub fn is_market(&self) -> bool {
        matches!(self, OrderKind::Market)
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OrderKind::Market => "MARKET",
            OrderKind::Limit => "LIMIT",
            OrderKind::StopLoss => "STOP_LOSS",
            OrderKind::StopLossLimit => "STOP_LOSS_LIMIT",
            OrderKind::TakeProfit => "TAKE_PROFIT",
            OrderKind::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Open,
    PartiallyFilled,
    Filled,
    Canceled,
    Closed,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Canceled | OrderStatus::Closed
        )
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Closed)
    }
}

/// Fee charged on a fill, denominated in either side of the pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub currency: String,
    pub amount: Decimal,
}

impl Fee {
    pub fn new(currency: impl Into<String>, amount: Decimal) -> Self {
        Self {
            currency: currency.into(),
            amount,
        }
    }
}

/// An instruction to buy or sell a symbol, tracked from planning to its
/// terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    exchange_id: Option<String>,
    symbol: Symbol,
    side: Side,
    kind: OrderKind,
    origin_price: Decimal,
    origin_quantity: Decimal,
    origin_stop_price: Option<Decimal>,
    filled_price: Decimal,
    filled_quantity: Decimal,
    fee: Option<Fee>,
    status: OrderStatus,
    created_at: i64,
    canceled_at: Option<i64>,
    filled_at: Option<i64>,
    linked_orders: Vec<Uuid>,
    simulated: bool,
}

impl Order {
    pub fn new(
        symbol: Symbol,
        side: Side,
        kind: OrderKind,
        quantity: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            exchange_id: None,
            symbol,
            side,
            kind,
            origin_price: price,
            origin_quantity: quantity,
            origin_stop_price: None,
            filled_price: Decimal::ZERO,
            filled_quantity: Decimal::ZERO,
            fee: None,
            status: OrderStatus::Open,
            created_at: crate::now_millis(),
            canceled_at: None,
            filled_at: None,
            linked_orders: Vec::new(),
            simulated: false,
        }
    }

    pub fn with_stop_price(mut self, stop_price: Decimal) -> Self {
        self.origin_stop_price = Some(stop_price);
        self
    }

    pub fn with_simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    pub fn with_created_at(mut self, timestamp: i64) -> Self {
        self.created_at = timestamp;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn exchange_id(&self) -> Option<&str> {
        self.exchange_id.as_deref()
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    /// Returns `(currency, market)` of the traded pair.
    pub fn currency_and_market(&self) -> (&str, &str) {
        self.symbol.split()
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn kind(&self) -> OrderKind {
        self.kind
    }

    pub fn origin_price(&self) -> Decimal {
        self.origin_price
    }

    pub fn origin_quantity(&self) -> Decimal {
        self.origin_quantity
    }

    pub fn origin_stop_price(&self) -> Option<Decimal> {
        self.origin_stop_price
    }

    /// Price that triggers a contingent order, or the limit price otherwise.
    pub fn trigger_price(&self) -> Decimal {
        self.origin_stop_price.unwrap_or(self.origin_price)
    }

    pub fn filled_price(&self) -> Decimal {
        self.filled_price
    }

    pub fn filled_quantity(&self) -> Decimal {
        self.filled_quantity
    }

    pub fn fee(&self) -> Option<&Fee> {
        self.fee.as_ref()
    }

    pub fn status(&self) -> OrderStatus {
        self.status
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

    pub fn linked_orders(&self) -> &[Uuid] {
        &self.linked_orders
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    /// Quote value of the order at its origin price.
    pub fn origin_cost(&self) -> Decimal {
        self.origin_quantity * self.origin_price
    }

    pub fn set_exchange_id(&mut self, exchange_id: impl Into<String>) {
        self.exchange_id = Some(exchange_id.into());
    }

    /// Bundles `other` with this order so that they share cancellation fate.
    pub fn link_to(&mut self, other: Uuid) {
        if other != self.id && !self.linked_orders.contains(&other) {
            self.linked_orders.push(other);
        }
    }

    pub fn unlink(&mut self, other: &Uuid) {
        self.linked_orders.retain(|id| id != other);
    }

    /// Edits the origin quantity and price of a still open order.
    pub fn edit(&mut self, quantity: Decimal, price: Decimal) {
        self.origin_quantity = quantity;
        self.origin_price = price;
    }

    pub fn mark_filled(&mut self, price: Decimal, quantity: Decimal, fee: Option<Fee>, timestamp: i64) {
        self.filled_price = price;
        self.filled_quantity = quantity;
        self.fee = fee;
        self.status = OrderStatus::Filled;
        self.filled_at = Some(timestamp);
    }

    pub fn mark_canceled(&mut self, timestamp: i64) {
        self.status = OrderStatus::Canceled;
        self.canceled_at = Some(timestamp);
    }

    /// Applies what the exchange reported about this order.
    pub fn apply_report(&mut self, report: &ExecutionReport) {
        if let Some(exchange_id) = &report.exchange_id {
            self.exchange_id = Some(exchange_id.clone());
        }
        match report.status {
            OrderStatus::Filled | OrderStatus::Closed => {
                let price = if report.filled_price.is_zero() {
                    self.origin_price
                } else {
                    report.filled_price
                };
                let quantity = if report.filled_quantity.is_zero() {
                    self.origin_quantity
                } else {
                    report.filled_quantity
                };
                self.mark_filled(price, quantity, report.fee.clone(), report.timestamp);
                self.status = report.status;
            }
            OrderStatus::Canceled => self.mark_canceled(report.timestamp),
            OrderStatus::PartiallyFilled => {
                self.filled_quantity = report.filled_quantity;
                self.filled_price = report.filled_price;
                self.status = OrderStatus::PartiallyFilled;
            }
            OrderStatus::Open => self.status = OrderStatus::Open,
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {} @ {}",
            self.symbol, self.side, self.kind, self.origin_quantity, self.origin_price
        )?;
        if let Some(stop) = self.origin_stop_price {
            write!(f, " (stop {})", stop)?;
        }
        Ok(())
    }
}
