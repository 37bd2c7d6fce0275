//! # Trading State Decider
//!
//! Maps the consolidated score of one (exchange, symbol) onto a
//! `TradingState` and acts on every change: open orders of the symbol are
//! canceled, the planner sizes new ones and the trader submits them.
//!
//! Scores live in [-1, 1]; a negative score is bullish.

use crate::engine::{PlacementOutcome, Trader};
use crate::models::{BalanceView, SubPortfolio};
use crate::planner::OrderPlanner;
use log::{debug, info, warn};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;
use trading::{Order, Symbol, TradingResult, TradingState};
use trading_core::framework::{BotEvent, EventBus, Readiness};

/// Width of the hysteresis band at full risk.
pub const RISK_THRESHOLD: f64 = 0.2;

const VERY_LONG_THRESHOLD: f64 = -0.6;
const LONG_THRESHOLD: f64 = -0.2;
const NEUTRAL_THRESHOLD: f64 = 0.2;
const SHORT_THRESHOLD: f64 = 0.6;

/// State of a score. A higher risk widens the long and short bands.
pub fn compute_state(score: f64, risk: f64) -> TradingState {
    let delta = RISK_THRESHOLD * risk;
    if score < VERY_LONG_THRESHOLD + delta {
        TradingState::VeryLong
    } else if score < LONG_THRESHOLD + delta {
        TradingState::Long
    } else if score < NEUTRAL_THRESHOLD - delta {
        TradingState::Neutral
    } else if score < SHORT_THRESHOLD - delta {
        TradingState::Short
    } else {
        TradingState::VeryShort
    }
}

#[derive(Debug, Clone)]
pub enum Decision {
    /// Some managed time frame has not completed a cycle yet.
    NotPrimed,
    Unchanged,
    Changed {
        state: TradingState,
        outcome: PlacementOutcome,
    },
}

pub struct TradingStateDecider {
    symbol: Symbol,
    risk: f64,
    planner: OrderPlanner,
    trader: Arc<Trader>,
    readiness: Readiness,
    events: EventBus,
    sub_portfolio_percent: Option<Decimal>,
    trading_enabled: bool,
    state: TradingState,
    final_eval: Option<f64>,
}

impl TradingStateDecider {
    pub fn new(
        symbol: Symbol,
        risk: f64,
        trader: Arc<Trader>,
        readiness: Readiness,
        events: EventBus,
    ) -> Self {
        let planner_risk = Decimal::from_f64(risk).unwrap_or(Decimal::ONE);
        Self {
            symbol,
            risk,
            planner: OrderPlanner::new(planner_risk),
            trader,
            readiness,
            events,
            sub_portfolio_percent: None,
            trading_enabled: true,
            state: TradingState::Neutral,
            final_eval: None,
        }
    }

    /// Sizes orders from a share of the portfolio instead of all of it.
    pub fn with_sub_portfolio(mut self, percent: Option<Decimal>) -> Self {
        self.sub_portfolio_percent = percent;
        self
    }

    /// A disabled decider still tracks and publishes states but never
    /// touches orders.
    pub fn with_trading_enabled(mut self, enabled: bool) -> Self {
        self.trading_enabled = enabled;
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn state(&self) -> TradingState {
        self.state
    }

    pub fn final_eval(&self) -> Option<f64> {
        self.final_eval
    }

    /// Stores the score used by the next `decide`. Returns false when
    /// `score` is not a number within [-1, 1].
    pub fn set_final_eval(&mut self, score: f64) -> bool {
        if !(-1.0..=1.0).contains(&score) {
            warn!("{}: ignoring final evaluation {}", self.symbol, score);
            return false;
        }
        self.final_eval = Some(score);
        true
    }

    pub async fn decide(&mut self) -> TradingResult<Decision> {
        if !self.readiness.is_primed() {
            debug!("{}: not every time frame evaluated yet", self.symbol);
            return Ok(Decision::NotPrimed);
        }
        let Some(score) = self.final_eval else {
            debug!("{}: no final evaluation yet", self.symbol);
            return Ok(Decision::Unchanged);
        };
        self.set_state(compute_state(score, self.risk)).await
    }

    pub async fn set_state(&mut self, new_state: TradingState) -> TradingResult<Decision> {
        if new_state == self.state {
            return Ok(Decision::Unchanged);
        }
        let score = self.final_eval.unwrap_or_default();
        info!(
            "{} {}: {} -> {} (score {:.4})",
            self.trader.exchange(),
            self.symbol,
            self.state,
            new_state,
            score
        );
        self.state = new_state;
        self.events.publish(BotEvent::StateChanged {
            exchange: self.trader.exchange().to_string(),
            symbol: self.symbol.clone(),
            state: new_state,
            score,
        });

        if new_state == TradingState::Neutral || !self.trading_enabled {
            return Ok(Decision::Changed {
                state: new_state,
                outcome: PlacementOutcome::default(),
            });
        }

        let canceled = self.trader.cancel_open_orders(&self.symbol).await;
        if canceled > 0 {
            debug!("{}: canceled {} open orders", self.symbol, canceled);
        }

        let orders = self.plan(score).await?;
        let mut outcome = self.trader.create_orders(orders.clone()).await;

        let retry = outcome.insufficient_balance_indices();
        if !retry.is_empty() {
            warn!(
                "{}: {} orders lacked balance, refreshing the portfolio",
                self.symbol,
                retry.len()
            );
            if let Err(e) = self.trader.force_refresh_portfolio().await {
                warn!("{}: portfolio refresh failed: {}", self.symbol, e);
            }
            outcome.failed.retain(|(index, _)| !retry.contains(index));
            let second: Vec<Order> = retry.iter().map(|i| orders[*i].clone()).collect();
            let retried = self.trader.create_orders(second).await;
            outcome.placed.extend(retried.placed);
            outcome
                .failed
                .extend(retried.failed.into_iter().map(|(i, e)| (retry[i], e)));
            outcome.failed.sort_by_key(|(index, _)| *index);
        }

        Ok(Decision::Changed {
            state: new_state,
            outcome,
        })
    }

    async fn plan(&self, score: f64) -> TradingResult<Vec<Order>> {
        let gateway = self.trader.gateway();
        let market = match gateway.get_market_status(&self.symbol).await {
            Ok(market) => Some(market),
            Err(e) => {
                warn!("{}: no market status: {}", self.symbol, e);
                None
            }
        };
        let last_price = match gateway.get_price_ticker(&self.symbol).await {
            Ok(ticker) => Some(ticker.last),
            Err(e) => {
                warn!("{}: no price: {}", self.symbol, e);
                None
            }
        };

        let portfolio = self.trader.portfolio();
        let view: Box<dyn BalanceView + Send> = match self.sub_portfolio_percent {
            Some(percent) => Box::new(SubPortfolio::new(portfolio, percent, true).await?),
            None => Box::new(portfolio.lock().await.clone()),
        };

        let score = Decimal::from_f64(score).unwrap_or_default();
        let orders = self.planner.create_new_orders(
            score,
            &self.symbol,
            self.state,
            view.as_ref(),
            market.as_ref(),
            last_price,
        );
        Ok(orders.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests;
