//! When a simulated order fills.
//!
//! Each (kind, side) maps to a check over the recent trades printed since the
//! order was created. A check returns the fill price when the order fills.

use rust_decimal::Decimal;
use trading::{Order, OrderKind, RecentTrade, Side};

pub type FillCheck = fn(&Order, &[RecentTrade]) -> Option<Decimal>;

pub fn policy_for(kind: OrderKind, side: Side) -> FillCheck {
    match (kind, side) {
        (OrderKind::Market, _) => fill_market,
        (OrderKind::Limit, Side::Buy) => fill_buy_limit,
        (OrderKind::Limit, Side::Sell) => fill_sell_limit,
        (OrderKind::StopLoss | OrderKind::StopLossLimit, Side::Sell) => fill_falling_stop,
        (OrderKind::StopLoss | OrderKind::StopLossLimit, Side::Buy) => fill_rising_stop,
        (OrderKind::TakeProfit | OrderKind::TakeProfitLimit, Side::Sell) => fill_rising_target,
        (OrderKind::TakeProfit | OrderKind::TakeProfitLimit, Side::Buy) => fill_falling_target,
    }
}

/// Trades that happened after `order` was created.
fn since_creation<'a>(
    order: &'a Order,
    trades: &'a [RecentTrade],
) -> impl Iterator<Item = Decimal> + 'a {
    trades
        .iter()
        .filter(move |t| t.timestamp >= order.created_at())
        .map(|t| t.price)
}

fn min_price(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    since_creation(order, trades).min()
}

fn max_price(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    since_creation(order, trades).max()
}

/// Fills right away, at the last printed price when there is one.
fn fill_market(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    Some(
        trades
            .last()
            .map(|t| t.price)
            .unwrap_or_else(|| order.origin_price()),
    )
}

fn fill_buy_limit(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    min_price(order, trades)
        .filter(|min| *min < order.origin_price())
        .map(|_| order.origin_price())
}

fn fill_sell_limit(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    max_price(order, trades)
        .filter(|max| *max > order.origin_price())
        .map(|_| order.origin_price())
}

fn fill_falling_stop(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    let stop = order.trigger_price();
    min_price(order, trades)
        .filter(|min| *min < stop)
        .map(|_| fill_price_after_trigger(order))
}

fn fill_rising_stop(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    let stop = order.trigger_price();
    max_price(order, trades)
        .filter(|max| *max > stop)
        .map(|_| fill_price_after_trigger(order))
}

fn fill_rising_target(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    let target = order.trigger_price();
    max_price(order, trades)
        .filter(|max| *max > target)
        .map(|_| fill_price_after_trigger(order))
}

fn fill_falling_target(order: &Order, trades: &[RecentTrade]) -> Option<Decimal> {
    let target = order.trigger_price();
    min_price(order, trades)
        .filter(|min| *min < target)
        .map(|_| fill_price_after_trigger(order))
}

/// Triggered orders fill at their trigger, or at their limit for `*Limit` kinds.
fn fill_price_after_trigger(order: &Order) -> Decimal {
    match order.kind() {
        OrderKind::StopLossLimit | OrderKind::TakeProfitLimit => order.origin_price(),
        _ => order.trigger_price(),
    }
}
