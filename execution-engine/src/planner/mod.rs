//! # Order Planner
//!
//! Turns a trading state and a consolidated score into concrete orders sized
//! from the available balance, adapted to the market precision and limits,
//! split when a single order would exceed them, and bundled with protective
//! stop-losses. The planner never mutates the portfolio.

pub mod factors;
pub mod precision;

use crate::models::BalanceView;
use factors::{
    limit_price_factor, limit_quantity_factor, market_quantity_factor, stop_loss_factor,
};
use log::{debug, warn};
use precision::{adapt_price, adapt_quantity, check_limits, split_quantity};
use rust_decimal::Decimal;
use trading::{MarketStatus, Order, OrderKind, Side, Symbol, TradingState};

/// Balances at or below this amount are treated as empty.
pub const MIN_TRIGGER_EPSILON: Decimal = Decimal::from_parts(1, 0, 0, false, 8);

/// A sell leaving less than this multiple of the market minimums sells all.
const DUST_MULTIPLIER: Decimal = Decimal::from_parts(14, 0, 0, false, 1);

#[derive(Debug, Clone, Copy)]
pub struct OrderPlanner {
    risk: Decimal,
}

impl OrderPlanner {
    pub fn new(risk: Decimal) -> Self {
        Self { risk }
    }

    pub fn risk(&self) -> Decimal {
        self.risk
    }

    /// Whether `state` can be acted upon with the balances of `portfolio`.
    ///
    /// Without market information an order is only refused on the side the
    /// portfolio already holds.
    pub fn can_create_order(
        &self,
        symbol: &Symbol,
        state: TradingState,
        portfolio: &dyn BalanceView,
        market: Option<&MarketStatus>,
    ) -> bool {
        let (base, quote) = symbol.split();
        let holds_base = portfolio.available(base) > MIN_TRIGGER_EPSILON;
        if market.is_none() {
            return match state {
                TradingState::Neutral => false,
                s if s.is_selling() => !holds_base,
                _ => holds_base,
            };
        }
        match state {
            TradingState::Neutral => false,
            s if s.is_selling() => holds_base,
            _ => portfolio.available(quote) > MIN_TRIGGER_EPSILON,
        }
    }

    /// Plans the orders for `state`.
    ///
    /// Returns `None` when nothing can be planned (neutral state, unknown
    /// market, missing price, every order below the market minimums) and an
    /// empty plan when the needed balance is missing. Every primary order is
    /// followed by the contingent orders linked to it.
    pub fn create_new_orders(
        &self,
        score: Decimal,
        symbol: &Symbol,
        state: TradingState,
        portfolio: &dyn BalanceView,
        market: Option<&MarketStatus>,
        last_price: Option<Decimal>,
    ) -> Option<Vec<Order>> {
        if state == TradingState::Neutral {
            return None;
        }
        let market = market?;
        let price = last_price.filter(|p| *p > Decimal::ZERO)?;
        if !self.can_create_order(symbol, state, portfolio, Some(market)) {
            debug!("{}: not enough balance to go {}", symbol, state);
            return Some(Vec::new());
        }

        let eval_abs = score.abs().min(Decimal::ONE);
        let (base, quote) = symbol.split();
        let orders = match state {
            TradingState::VeryShort => {
                let available = portfolio.available(base);
                let quantity =
                    available * market_quantity_factor(Side::Sell, eval_abs, self.risk);
                let quantity = self.sell_dust(market, available, quantity, price);
                self.build(market, symbol, Side::Sell, OrderKind::Market, quantity, price, None)
            }
            TradingState::Short => {
                let available = portfolio.available(base);
                let quantity = available * limit_quantity_factor(eval_abs, self.risk);
                let limit_price = price * limit_price_factor(Side::Sell, eval_abs, self.risk);
                let quantity = self.sell_dust(market, available, quantity, limit_price);
                let stop_price = price * stop_loss_factor(self.risk);
                self.build(
                    market,
                    symbol,
                    Side::Sell,
                    OrderKind::Limit,
                    quantity,
                    limit_price,
                    Some(stop_price),
                )
            }
            TradingState::Long => {
                let affordable = self.affordable(market, portfolio.available(quote), price);
                let quantity = affordable * limit_quantity_factor(eval_abs, self.risk);
                let limit_price = price * limit_price_factor(Side::Buy, eval_abs, self.risk);
                self.build(market, symbol, Side::Buy, OrderKind::Limit, quantity, limit_price, None)
            }
            TradingState::VeryLong => {
                let affordable = self.affordable(market, portfolio.available(quote), price);
                let quantity = affordable * market_quantity_factor(Side::Buy, eval_abs, self.risk);
                self.build(market, symbol, Side::Buy, OrderKind::Market, quantity, price, None)
            }
            TradingState::Neutral => Vec::new(),
        };

        if orders.is_empty() {
            None
        } else {
            Some(orders)
        }
    }

    /// Base quantity the quote balance buys at `price`.
    fn affordable(&self, market: &MarketStatus, quote: Decimal, price: Decimal) -> Decimal {
        if market.inverse {
            quote * price
        } else {
            quote / price
        }
    }

    /// Sells everything when the remainder would be too small to trade later.
    fn sell_dust(
        &self,
        market: &MarketStatus,
        available: Decimal,
        quantity: Decimal,
        price: Decimal,
    ) -> Decimal {
        let remaining = available - quantity;
        let limits = &market.limits;
        let dust_amount = limits
            .amount
            .min
            .is_some_and(|min| remaining < min * DUST_MULTIPLIER);
        let dust_cost = limits
            .cost
            .min
            .is_some_and(|min| remaining * price < min * DUST_MULTIPLIER);
        if dust_amount || dust_cost {
            debug!(
                "{}: selling the whole {} instead of leaving {}",
                market.symbol, available, remaining
            );
            available
        } else {
            quantity
        }
    }

    /// Adapts, splits and checks the orders of one side, bundling a stop-loss
    /// with each split order when `stop_price` is given.
    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        market: &MarketStatus,
        symbol: &Symbol,
        side: Side,
        kind: OrderKind,
        quantity: Decimal,
        price: Decimal,
        stop_price: Option<Decimal>,
    ) -> Vec<Order> {
        let quantity = adapt_quantity(market, quantity);
        let price = adapt_price(market, price);
        let stop_price = stop_price.map(|stop| adapt_price(market, stop));

        let parts = match split_quantity(market, quantity, price) {
            Ok(parts) => parts,
            Err(e) => {
                warn!("Dropping {} {} {} of {}: {}", symbol, side, kind, quantity, e);
                return Vec::new();
            }
        };

        let mut orders = Vec::new();
        for part in parts {
            if let Err(e) = check_limits(market, part, price) {
                warn!("Dropping {} {} {} of {}: {}", symbol, side, kind, part, e);
                continue;
            }
            let mut primary = Order::new(symbol.clone(), side, kind, part, price);
            let stop = stop_price.filter(|stop| match check_limits(market, part, *stop) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Leaving {} {} {} of {} without stop: {}", symbol, side, kind, part, e);
                    false
                }
            });
            let Some(stop) = stop else {
                orders.push(primary);
                continue;
            };
            let mut stop_loss = Order::new(symbol.clone(), side, OrderKind::StopLoss, part, stop)
                .with_stop_price(stop);
            primary.link_to(stop_loss.id());
            stop_loss.link_to(primary.id());
            orders.push(primary);
            orders.push(stop_loss);
        }
        orders
    }
}
