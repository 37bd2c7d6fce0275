use super::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use trading::{Fee, Order, OrderKind, PortfolioEntry, Side, Symbol, TradingError};

fn btc_usdt() -> Symbol {
    Symbol::new("BTC", "USDT")
}

fn create_test_portfolio() -> Portfolio {
    let totals = HashMap::from([
        ("BTC".to_string(), dec!(10)),
        ("USDT".to_string(), dec!(2000)),
    ]);
    Portfolio::from_totals(&totals)
}

fn limit(side: Side, quantity: Decimal, price: Decimal) -> Order {
    Order::new(btc_usdt(), side, OrderKind::Limit, quantity, price)
}

fn assert_consistent(portfolio: &Portfolio) {
    for (asset, entry) in portfolio.entries() {
        assert!(entry.available <= entry.total, "{} available above total", asset);
        assert_eq!(entry.total - entry.available, portfolio.reserved(asset), "{}", asset);
    }
}

#[test]
fn test_buy_reserves_quote_and_sell_reserves_base() {
    let mut portfolio = create_test_portfolio();
    portfolio.reserve(&limit(Side::Buy, dec!(0.1), dec!(5000))).unwrap();
    portfolio.reserve(&limit(Side::Sell, dec!(3), dec!(7000))).unwrap();

    assert_eq!(portfolio.available("USDT"), dec!(1500));
    assert_eq!(portfolio.available("BTC"), dec!(7));
    assert_eq!(portfolio.total("USDT"), dec!(2000));
    assert_consistent(&portfolio);
}

#[test]
fn test_contingent_orders_never_reserve() {
    let mut portfolio = create_test_portfolio();
    let stop = Order::new(btc_usdt(), Side::Sell, OrderKind::StopLoss, dec!(10), dec!(6000))
        .with_stop_price(dec!(6000));
    portfolio.reserve(&stop).unwrap();
    assert_eq!(portfolio.available("BTC"), dec!(10));
    assert_eq!(portfolio.reservation_count(), 0);
}

#[test]
fn test_insufficient_balance_changes_nothing() {
    let mut portfolio = create_test_portfolio();
    let order = limit(Side::Buy, dec!(1), dec!(5000));
    match portfolio.reserve(&order) {
        Err(TradingError::InsufficientBalance {
            asset,
            required,
            available,
        }) => {
            assert_eq!(asset, "USDT");
            assert_eq!(required, dec!(5000));
            assert_eq!(available, dec!(2000));
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(portfolio.available("USDT"), dec!(2000));
    assert!(!portfolio.is_reserved(&order.id()));
}

#[test]
fn test_release_is_idempotent() {
    let mut portfolio = create_test_portfolio();
    let order = limit(Side::Sell, dec!(4), dec!(7000));
    portfolio.reserve(&order).unwrap();
    portfolio.reserve(&order).unwrap();
    assert_eq!(portfolio.available("BTC"), dec!(6));

    assert!(portfolio.release(&order));
    assert!(!portfolio.release(&order));
    assert_eq!(portfolio.available("BTC"), dec!(10));
    assert_consistent(&portfolio);
}

#[test]
fn test_settle_buy_with_base_fee() {
    let mut portfolio = create_test_portfolio();
    let mut order = limit(Side::Buy, dec!(0.2), dec!(5000));
    portfolio.reserve(&order).unwrap();

    order.mark_filled(dec!(5000), dec!(0.2), Some(Fee::new("BTC", dec!(0.0002))), 1);
    portfolio.settle(&order);

    assert_eq!(portfolio.get_currency_portfolio("BTC"), PortfolioEntry::free(dec!(10.1998)));
    assert_eq!(portfolio.get_currency_portfolio("USDT"), PortfolioEntry::free(dec!(1000)));
    assert_consistent(&portfolio);
}

#[test]
fn test_settle_sell_with_quote_fee() {
    let mut portfolio = create_test_portfolio();
    let mut order = limit(Side::Sell, dec!(2), dec!(7000));
    portfolio.reserve(&order).unwrap();
    assert_eq!(portfolio.available("BTC"), dec!(8));

    order.mark_filled(dec!(7000), dec!(2), Some(Fee::new("USDT", dec!(14))), 1);
    portfolio.settle(&order);

    assert_eq!(portfolio.get_currency_portfolio("BTC"), PortfolioEntry::free(dec!(8)));
    assert_eq!(portfolio.get_currency_portfolio("USDT"), PortfolioEntry::free(dec!(15986)));
}

#[test]
fn test_settle_contingent_fill_deducts_available() {
    let mut portfolio = create_test_portfolio();
    let mut stop = Order::new(btc_usdt(), Side::Sell, OrderKind::StopLoss, dec!(1), dec!(6000))
        .with_stop_price(dec!(6000));
    stop.mark_filled(dec!(6000), dec!(1), None, 1);
    portfolio.settle(&stop);

    assert_eq!(portfolio.get_currency_portfolio("BTC"), PortfolioEntry::free(dec!(9)));
    assert_eq!(portfolio.available("USDT"), dec!(8000));
}

#[test]
fn test_resync_rebuilds_reservations() {
    let mut portfolio = create_test_portfolio();
    let stale = limit(Side::Sell, dec!(5), dec!(7000));
    portfolio.reserve(&stale).unwrap();

    let open = limit(Side::Buy, dec!(0.1), dec!(5000));
    let balances = HashMap::from([
        ("BTC".to_string(), PortfolioEntry::new(dec!(1), dec!(12))),
        ("USDT".to_string(), PortfolioEntry::free(dec!(3000))),
    ]);
    portfolio.resync(&balances, &[open.clone()]);

    assert_eq!(portfolio.get_currency_portfolio("BTC"), PortfolioEntry::free(dec!(12)));
    assert_eq!(portfolio.available("USDT"), dec!(2500));
    assert!(portfolio.is_reserved(&open.id()));
    assert!(!portfolio.is_reserved(&stale.id()));
    assert_consistent(&portfolio);
}

#[test]
fn test_deposit_and_withdraw() {
    let mut portfolio = Portfolio::new();
    portfolio.deposit("ETH", dec!(3));
    portfolio.withdraw("ETH", dec!(1)).unwrap();
    assert_eq!(portfolio.get_currency_portfolio("ETH"), PortfolioEntry::free(dec!(2)));
    assert!(portfolio.withdraw("ETH", dec!(5)).is_err());
    assert_eq!(portfolio.get_currency_portfolio("XRP"), PortfolioEntry::default());
}

#[test]
fn test_mixed_sequence_keeps_invariants() {
    let mut portfolio = create_test_portfolio();
    let mut orders = Vec::new();
    for i in 1..=5 {
        let order = limit(Side::Sell, Decimal::from(i) / dec!(4), dec!(7000));
        portfolio.reserve(&order).unwrap();
        assert_consistent(&portfolio);
        orders.push(order);
    }
    portfolio.release(&orders[1]);
    assert_consistent(&portfolio);
    let mut filled = orders[3].clone();
    filled.mark_filled(dec!(7000), filled.origin_quantity(), None, 2);
    portfolio.settle(&filled);
    assert_consistent(&portfolio);
    portfolio.release(&orders[1]);
    assert_consistent(&portfolio);
}

fn shared(portfolio: Portfolio) -> SharedPortfolio {
    Arc::new(Mutex::new(portfolio))
}

#[tokio::test]
async fn test_sub_portfolio_is_a_share_of_the_parent() {
    let parent = shared(create_test_portfolio());
    let sub = SubPortfolio::new(parent.clone(), dec!(0.25), true).await.unwrap();
    assert_eq!(sub.available("BTC"), dec!(2.5));
    assert_eq!(sub.total("USDT"), dec!(500));

    let fallback = SubPortfolio::new(parent, dec!(0), true).await.unwrap();
    assert_eq!(fallback.percent(), DEFAULT_SUB_PORTFOLIO_PERCENT);
    assert_eq!(fallback.available("BTC"), dec!(5));
}

#[tokio::test]
async fn test_sub_portfolio_forwards_to_parent() {
    let parent = shared(create_test_portfolio());
    let mut sub = SubPortfolio::new(parent.clone(), dec!(0.5), true).await.unwrap();

    let order = limit(Side::Sell, dec!(2), dec!(7000));
    sub.reserve(&order).await.unwrap();
    assert_eq!(sub.available("BTC"), dec!(3));
    assert_eq!(parent.lock().await.available("BTC"), dec!(8));

    // More than the share, even though the parent could afford it.
    let too_big = limit(Side::Sell, dec!(4), dec!(7000));
    assert!(sub.reserve(&too_big).await.is_err());
    assert_eq!(parent.lock().await.available("BTC"), dec!(8));

    assert!(sub.release(&order).await);
    assert_eq!(sub.available("BTC"), dec!(5));
    assert_eq!(parent.lock().await.available("BTC"), dec!(10));
}

#[tokio::test]
async fn test_sub_portfolio_undoes_local_reservation_on_parent_refusal() {
    let parent = shared(create_test_portfolio());
    let mut sub = SubPortfolio::new(parent.clone(), dec!(0.5), true).await.unwrap();

    parent
        .lock()
        .await
        .reserve(&limit(Side::Sell, dec!(9), dec!(7000)))
        .unwrap();
    let order = limit(Side::Sell, dec!(2), dec!(7000));
    assert!(sub.reserve(&order).await.is_err());
    assert_eq!(sub.available("BTC"), dec!(5));
}

#[tokio::test]
async fn test_relative_and_absolute_refresh() {
    let parent = shared(create_test_portfolio());
    let mut relative = SubPortfolio::new(parent.clone(), dec!(0.5), true).await.unwrap();
    let mut absolute = SubPortfolio::new(parent.clone(), dec!(0.5), false).await.unwrap();

    parent.lock().await.deposit("BTC", dec!(10));
    relative.update_from_parent().await;
    absolute.update_from_parent().await;

    assert_eq!(relative.total("BTC"), dec!(10));
    assert_eq!(absolute.total("BTC"), dec!(5));
}

#[tokio::test]
async fn test_sub_portfolio_settle_reaches_parent() {
    let parent = shared(create_test_portfolio());
    let mut sub = SubPortfolio::new(parent.clone(), dec!(0.5), true).await.unwrap();
    let mut order = limit(Side::Buy, dec!(0.1), dec!(5000));
    sub.reserve(&order).await.unwrap();

    order.mark_filled(dec!(5000), dec!(0.1), None, 1);
    sub.settle(&order).await;

    assert_eq!(sub.total("BTC"), dec!(5.1));
    assert_eq!(sub.available("USDT"), dec!(500));
    let parent = parent.lock().await;
    assert_eq!(parent.get_currency_portfolio("BTC"), PortfolioEntry::free(dec!(10.1)));
    assert_eq!(parent.get_currency_portfolio("USDT"), PortfolioEntry::free(dec!(1500)));
}
