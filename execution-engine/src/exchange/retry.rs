use async_trait::async_trait;
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use trading::{
    ExecutionReport, Gateway, MarketStatus, Order, PortfolioEntry, RecentTrade, Symbol, Ticker,
    TradingResult,
};
use trading_core::config::RetryConfig;

/// Retries retryable gateway errors with an exponential backoff.
///
/// Fatal and non-retryable errors go back to the caller on the first
/// attempt. After `max_attempts` the last error is returned.
pub struct RetryingGateway<G> {
    inner: G,
    max_attempts: u32,
    base_delay: Duration,
}

impl<G: Gateway> RetryingGateway<G> {
    pub fn new(inner: G, config: RetryConfig) -> Self {
        Self {
            inner,
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }

    async fn call<T, F, Fut>(&self, operation: &str, mut attempt: F) -> TradingResult<T>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = TradingResult<T>> + Send,
    {
        let mut tries = 0;
        loop {
            tries += 1;
            match attempt().await {
                Err(e) if e.is_retryable() && tries < self.max_attempts => {
                    let delay = self.base_delay * 2u32.saturating_pow(tries - 1);
                    warn!(
                        "{}: {} failed ({}), retrying in {:?} ({}/{})",
                        self.inner.name(),
                        operation,
                        e,
                        delay,
                        tries,
                        self.max_attempts
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<G: Gateway> Gateway for RetryingGateway<G> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn is_simulated(&self) -> bool {
        self.inner.is_simulated()
    }

    async fn get_balance(&self) -> TradingResult<HashMap<String, PortfolioEntry>> {
        self.call("get_balance", || self.inner.get_balance()).await
    }

    async fn create_order(&self, order: &Order) -> TradingResult<ExecutionReport> {
        self.call("create_order", || self.inner.create_order(order))
            .await
    }

    async fn cancel_order(&self, exchange_id: &str, symbol: &Symbol) -> TradingResult<()> {
        self.call("cancel_order", || self.inner.cancel_order(exchange_id, symbol))
            .await
    }

    async fn get_order(&self, exchange_id: &str, symbol: &Symbol) -> TradingResult<ExecutionReport> {
        self.call("get_order", || self.inner.get_order(exchange_id, symbol))
            .await
    }

    async fn edit_order(
        &self,
        exchange_id: &str,
        symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> TradingResult<ExecutionReport> {
        self.call("edit_order", || {
            self.inner.edit_order(exchange_id, symbol, quantity, price)
        })
        .await
    }

    async fn get_market_status(&self, symbol: &Symbol) -> TradingResult<MarketStatus> {
        self.call("get_market_status", || self.inner.get_market_status(symbol))
            .await
    }

    async fn get_price_ticker(&self, symbol: &Symbol) -> TradingResult<Ticker> {
        self.call("get_price_ticker", || self.inner.get_price_ticker(symbol))
            .await
    }

    async fn get_recent_trades(&self, symbol: &Symbol) -> TradingResult<Vec<RecentTrade>> {
        self.call("get_recent_trades", || self.inner.get_recent_trades(symbol))
            .await
    }
}
