//! Shared domain model for the trading workspace.
//!
//! Every other crate speaks in these types: symbols, time frames, orders and
//! their execution reports, market constraints, portfolio entries, trades and
//! the `Gateway` boundary towards an exchange.

pub mod error;
pub mod model;
pub mod traits;

pub use error::{TradingError, TradingResult};
pub use model::execution::ExecutionReport;
pub use model::market::{Bounds, MarketLimits, MarketPrecision, MarketStatus};
pub use model::market_data::{MarketEvent, OrderBook, RecentTrade, Ticker, Topic};
pub use model::order::{Fee, Order, OrderKind, OrderStatus, Side};
pub use model::portfolio::PortfolioEntry;
pub use model::state::TradingState;
pub use model::symbol::Symbol;
pub use model::time_frame::TimeFrame;
pub use model::trade::Trade;
pub use traits::gateway::Gateway;

/// Current time as unix milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub mod prelude {
    pub use crate::error::{TradingError, TradingResult};
    pub use crate::model::order::{Order, OrderKind, OrderStatus, Side};
    pub use crate::model::state::TradingState;
    pub use crate::model::symbol::Symbol;
    pub use crate::traits::gateway::Gateway;
    pub use rust_decimal::Decimal;
}
