use log::{debug, warn};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use trading::{ExecutionReport, Gateway, Order, OrderStatus, TradingError, TradingResult};
use trading_core::config::TimeoutConfig;

/// What the poller waits for after an order operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusWait {
    MarketFill,
    OpenConfirmation,
    CancelConfirmation,
    EditConfirmation,
}

impl StatusWait {
    fn is_reached(&self, status: OrderStatus) -> bool {
        match self {
            StatusWait::MarketFill => status.is_filled(),
            StatusWait::OpenConfirmation | StatusWait::EditConfirmation => {
                status != OrderStatus::Canceled
            }
            StatusWait::CancelConfirmation => status == OrderStatus::Canceled,
        }
    }
}

impl fmt::Display for StatusWait {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusWait::MarketFill => "market fill",
            StatusWait::OpenConfirmation => "open confirmation",
            StatusWait::CancelConfirmation => "cancel confirmation",
            StatusWait::EditConfirmation => "edit confirmation",
        };
        f.write_str(name)
    }
}

/// Time budget of each wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTimeouts {
    pub market_fill: Duration,
    pub open_confirmation: Duration,
    pub cancel_confirmation: Duration,
    pub edit_confirmation: Duration,
    pub poll_interval: Duration,
}

impl OrderTimeouts {
    pub fn budget(&self, wait: StatusWait) -> Duration {
        match wait {
            StatusWait::MarketFill => self.market_fill,
            StatusWait::OpenConfirmation => self.open_confirmation,
            StatusWait::CancelConfirmation => self.cancel_confirmation,
            StatusWait::EditConfirmation => self.edit_confirmation,
        }
    }
}

impl From<&TimeoutConfig> for OrderTimeouts {
    fn from(config: &TimeoutConfig) -> Self {
        Self {
            market_fill: config.market_fill(),
            open_confirmation: config.open(),
            cancel_confirmation: config.cancel(),
            edit_confirmation: config.edit(),
            poll_interval: config.poll_interval(),
        }
    }
}

impl Default for OrderTimeouts {
    fn default() -> Self {
        Self::from(&TimeoutConfig::default())
    }
}

/// Polls an order's status until it reaches what an operation waits for.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderStatusPoller {
    timeouts: OrderTimeouts,
}

impl OrderStatusPoller {
    pub fn new(timeouts: OrderTimeouts) -> Self {
        Self { timeouts }
    }

    pub fn timeouts(&self) -> &OrderTimeouts {
        &self.timeouts
    }

    /// Returns the first report satisfying `wait`.
    ///
    /// Gives up with `TradingError::Timeout` once the budget of `wait` is
    /// spent; the caller keeps the order as last known. Retryable gateway
    /// errors are polled through, others abort the wait.
    pub async fn wait_for(
        &self,
        gateway: &dyn Gateway,
        order: &Order,
        wait: StatusWait,
    ) -> TradingResult<ExecutionReport> {
        let Some(exchange_id) = order.exchange_id() else {
            return Err(TradingError::UnknownOrder(format!(
                "{} has no exchange id",
                order.id()
            )));
        };
        let symbol = order.symbol();
        let interval = self.timeouts.poll_interval;

        let deadline = Instant::now() + self.timeouts.budget(wait);

        // Each call runs to completion; the deadline is only checked between calls.
        loop {
            match gateway.get_order(exchange_id, symbol).await {
                Ok(report) if wait.is_reached(report.status) => return Ok(report),
                Ok(report) => debug!(
                    "Order {} is {:?}, waiting for {}",
                    exchange_id, report.status, wait
                ),
                Err(e) if e.is_retryable() => {
                    warn!("Polling order {} failed: {}", exchange_id, e)
                }
                Err(e) => return Err(e),
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            tokio::time::sleep_until(deadline.min(now + interval)).await;
            if Instant::now() >= deadline {
                break;
            }
        }
        Err(TradingError::Timeout {
            operation: wait.to_string(),
            order_id: order.id().to_string(),
        })
    }
}
