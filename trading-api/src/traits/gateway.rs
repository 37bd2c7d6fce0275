//! Defines the `Gateway` trait, the narrow surface the core consumes from an
//! exchange.
//!
//! Transport, authentication and rate limiting live behind this trait. The core
//! only relies on the calls below and on the `TradingError` categories they
//! return: `ExchangeUnavailable` is retryable, `InvalidCredentials` is fatal.

use crate::error::TradingResult;
use crate::model::{
    execution::ExecutionReport,
    market::MarketStatus,
    market_data::{RecentTrade, Ticker},
    order::Order,
    portfolio::PortfolioEntry,
    symbol::Symbol,
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A connection to one exchange (real or simulated).
///
/// # Examples
///
/// ```ignore
/// let report = gateway.create_order(&order).await?;
/// order.apply_report(&report);
/// ```
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Name of the exchange, used as key in persisted state.
    fn name(&self) -> &str;

    /// Whether orders placed through this gateway never reach a real market.
    fn is_simulated(&self) -> bool;

    /// Balances per asset.
    async fn get_balance(&self) -> TradingResult<HashMap<String, PortfolioEntry>>;

    /// Places an order.
    ///
    /// # Arguments
    ///
    /// * `order` - A planned order; its kind, side, quantity, price and
    ///   optional stop price are sent to the exchange.
    ///
    /// # Returns
    ///
    /// * `ExecutionReport` - The acknowledgement, carrying the exchange id.
    async fn create_order(&self, order: &Order) -> TradingResult<ExecutionReport>;

    async fn cancel_order(&self, exchange_id: &str, symbol: &Symbol) -> TradingResult<()>;

    async fn get_order(&self, exchange_id: &str, symbol: &Symbol)
        -> TradingResult<ExecutionReport>;

    /// Changes quantity and price of an open order.
    async fn edit_order(
        &self,
        exchange_id: &str,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> TradingResult<ExecutionReport>;

    /// Precision and limits of a market. `UnknownMarket` if not traded here.
    async fn get_market_status(&self, symbol: &Symbol) -> TradingResult<MarketStatus>;

    async fn get_price_ticker(&self, symbol: &Symbol) -> TradingResult<Ticker>;

    async fn get_recent_trades(&self, symbol: &Symbol) -> TradingResult<Vec<RecentTrade>>;
}
