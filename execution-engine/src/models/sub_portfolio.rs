use super::portfolio::{BalanceView, Portfolio, SharedPortfolio};
use log::warn;
use rust_decimal::Decimal;
use std::collections::HashMap;
use trading::{Order, PortfolioEntry, TradingError, TradingResult};

/// Share of the parent portfolio used when none (or a non-positive one) is given.
pub const DEFAULT_SUB_PORTFOLIO_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// A fixed share of a parent portfolio.
///
/// A relative sub-portfolio follows the parent's current balances, an
/// absolute one keeps scaling the snapshot taken at creation. Mutations are
/// applied locally first, then forwarded to the parent.
#[derive(Debug)]
pub struct SubPortfolio {
    parent: SharedPortfolio,
    percent: Decimal,
    relative: bool,
    origin: HashMap<String, PortfolioEntry>,
    local: Portfolio,
}

impl SubPortfolio {
    pub async fn new(
        parent: SharedPortfolio,
        percent: Decimal,
        relative: bool,
    ) -> TradingResult<Self> {
        if percent > Decimal::ONE {
            return Err(TradingError::config(format!(
                "sub-portfolio percent must not exceed 1, got {}",
                percent
            )));
        }
        let percent = if percent <= Decimal::ZERO {
            warn!(
                "Sub-portfolio percent {} is not positive, using {}",
                percent, DEFAULT_SUB_PORTFOLIO_PERCENT
            );
            DEFAULT_SUB_PORTFOLIO_PERCENT
        } else {
            percent
        };

        let origin = parent.lock().await.entries().clone();
        let mut sub = Self {
            parent,
            percent,
            relative,
            origin,
            local: Portfolio::new(),
        };
        sub.update_from_parent().await;
        Ok(sub)
    }

    pub fn percent(&self) -> Decimal {
        self.percent
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn get_currency_portfolio(&self, asset: &str) -> PortfolioEntry {
        self.local.get_currency_portfolio(asset)
    }

    /// Recomputes the local balances as `percent` of the parent (relative)
    /// or of the creation snapshot (absolute).
    ///
    /// Local reservations are dropped: the parent already accounts for them.
    pub async fn update_from_parent(&mut self) {
        let source = if self.relative {
            self.parent.lock().await.entries().clone()
        } else {
            self.origin.clone()
        };
        let entries = source
            .into_iter()
            .map(|(asset, entry)| (asset, entry.scaled(self.percent)))
            .collect();
        self.local = Portfolio::from_entries(entries);
    }

    /// Reserves locally, then in the parent. A parent refusal undoes the
    /// local reservation.
    pub async fn reserve(&mut self, order: &Order) -> TradingResult<()> {
        self.local.reserve(order)?;
        if let Err(e) = self.parent.lock().await.reserve(order) {
            self.local.release(order);
            return Err(e);
        }
        Ok(())
    }

    pub async fn release(&mut self, order: &Order) -> bool {
        let local = self.local.release(order);
        let parent = self.parent.lock().await.release(order);
        local || parent
    }

    pub async fn settle(&mut self, order: &Order) {
        self.local.settle(order);
        self.parent.lock().await.settle(order);
    }
}

impl BalanceView for SubPortfolio {
    fn available(&self, asset: &str) -> Decimal {
        self.local.available(asset)
    }

    fn total(&self, asset: &str) -> Decimal {
        self.local.total(asset)
    }
}
