use super::*;
use crate::exchange::SimulatedGateway;
use crate::models::Portfolio;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use tokio::sync::Mutex;
use trading::{Gateway, MarketStatus, OrderKind, Side, Ticker, TimeFrame, TradingError};

fn btc_usdt() -> Symbol {
    Symbol::new("BTC", "USDT")
}

fn create_test_gateway(simulated: bool) -> Arc<SimulatedGateway> {
    let gateway = SimulatedGateway::new(dec!(0.001)).with_simulated(simulated);
    gateway.add_market(
        MarketStatus::new(btc_usdt())
            .with_precision(8, 8)
            .with_amount_limits(Some(dec!(0.00000001)), None)
            .with_cost_limits(Some(dec!(0.00000001)), None),
    );
    gateway.set_ticker(Ticker::new(btc_usdt(), dec!(6943.01), 1));
    Arc::new(gateway)
}

fn create_test_trader(gateway: Arc<SimulatedGateway>, events: EventBus) -> Arc<Trader> {
    let totals = HashMap::from([
        ("BTC".to_string(), dec!(10)),
        ("USDT".to_string(), dec!(2000)),
    ]);
    let portfolio = Arc::new(Mutex::new(Portfolio::from_totals(&totals)));
    Arc::new(Trader::new(gateway, portfolio, events))
}

fn primed() -> Readiness {
    let readiness = Readiness::new(&[TimeFrame::OneHour]);
    readiness.mark_completed(TimeFrame::OneHour);
    readiness
}

fn create_test_decider(trader: Arc<Trader>, risk: f64, events: EventBus) -> TradingStateDecider {
    TradingStateDecider::new(btc_usdt(), risk, trader, primed(), events)
}

#[test]
fn test_compute_state_without_risk() {
    assert_eq!(compute_state(-0.7, 0.0), TradingState::VeryLong);
    assert_eq!(compute_state(-0.6, 0.0), TradingState::Long);
    assert_eq!(compute_state(-0.3, 0.0), TradingState::Long);
    assert_eq!(compute_state(-0.2, 0.0), TradingState::Neutral);
    assert_eq!(compute_state(0.0, 0.0), TradingState::Neutral);
    assert_eq!(compute_state(0.2, 0.0), TradingState::Short);
    assert_eq!(compute_state(0.59, 0.0), TradingState::Short);
    assert_eq!(compute_state(0.6, 0.0), TradingState::VeryShort);
    assert_eq!(compute_state(1.0, 0.0), TradingState::VeryShort);
}

#[test]
fn test_full_risk_closes_the_neutral_band() {
    assert_eq!(compute_state(-0.5, 1.0), TradingState::VeryLong);
    assert_eq!(compute_state(-0.3, 1.0), TradingState::Long);
    assert_eq!(compute_state(-0.1, 1.0), TradingState::Long);
    assert_eq!(compute_state(0.0, 1.0), TradingState::Short);
    assert_eq!(compute_state(0.3, 1.0), TradingState::Short);
    assert_eq!(compute_state(0.5, 1.0), TradingState::VeryShort);
}

#[test]
fn test_out_of_range_scores_are_ignored() {
    let events = EventBus::new();
    let trader = create_test_trader(create_test_gateway(true), events.clone());
    let mut decider = create_test_decider(trader, 0.5, events);
    assert!(!decider.set_final_eval(1.5));
    assert!(!decider.set_final_eval(f64::NAN));
    assert_eq!(decider.final_eval(), None);
    assert!(decider.set_final_eval(-1.0));
    assert_eq!(decider.final_eval(), Some(-1.0));
}

#[tokio::test]
async fn test_nothing_happens_before_priming() {
    let gateway = create_test_gateway(true);
    let events = EventBus::new();
    let trader = create_test_trader(gateway.clone(), events.clone());
    let readiness = Readiness::new(&[TimeFrame::OneHour, TimeFrame::FourHours]);
    readiness.mark_completed(TimeFrame::OneHour);
    let mut decider = TradingStateDecider::new(btc_usdt(), 1.0, trader, readiness, events);

    decider.set_final_eval(0.9);
    assert!(matches!(decider.decide().await, Ok(Decision::NotPrimed)));
    assert_eq!(decider.state(), TradingState::Neutral);
    assert_eq!(gateway.calls(), 0);
}

#[tokio::test]
async fn test_neutral_band_scores_never_plan() {
    let gateway = create_test_gateway(true);
    let events = EventBus::new();
    let trader = create_test_trader(gateway.clone(), events.clone());
    let mut decider = create_test_decider(trader.clone(), 0.5, events);

    for score in [0.05, -0.09, 0.0, 0.099, -0.1] {
        assert!(decider.set_final_eval(score));
        assert!(matches!(decider.decide().await, Ok(Decision::Unchanged)));
    }
    assert_eq!(decider.state(), TradingState::Neutral);
    assert_eq!(gateway.calls(), 0);
    assert!(trader.open_orders().await.is_empty());
}

#[tokio::test]
async fn test_short_places_a_protected_sell() {
    let events = EventBus::new();
    let mut listener = events.subscribe();
    let trader = create_test_trader(create_test_gateway(true), events.clone());
    let mut decider = create_test_decider(trader.clone(), 1.0, events);

    decider.set_final_eval(0.65);
    let Decision::Changed { state, outcome } = decider.set_state(TradingState::Short).await.unwrap()
    else {
        panic!("state should change");
    };
    assert_eq!(state, TradingState::Short);
    assert!(outcome.is_complete());
    assert_eq!(outcome.placed.len(), 2);

    let sell = &outcome.placed[0];
    assert_eq!(sell.kind(), OrderKind::Limit);
    assert_eq!(sell.side(), Side::Sell);
    assert_eq!(sell.origin_quantity(), dec!(7.6));
    assert_eq!(sell.origin_price(), dec!(6995.95045125));
    assert!(sell.is_simulated());
    let stop = &outcome.placed[1];
    assert_eq!(stop.kind(), OrderKind::StopLoss);
    assert_eq!(stop.trigger_price(), dec!(6595.8595));
    assert_eq!(stop.linked_orders(), &[sell.id()]);

    let portfolio = trader.portfolio();
    let btc = portfolio.lock().await.get_currency_portfolio("BTC");
    assert_eq!(btc.available, dec!(2.4));
    assert_eq!(btc.total, dec!(10));

    match listener.try_recv().unwrap() {
        BotEvent::StateChanged { state, score, .. } => {
            assert_eq!(state, TradingState::Short);
            assert_eq!(score, 0.65);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn test_same_state_twice_places_nothing_new() {
    let events = EventBus::new();
    let trader = create_test_trader(create_test_gateway(true), events.clone());
    let mut decider = create_test_decider(trader.clone(), 1.0, events);

    decider.set_final_eval(0.65);
    decider.set_state(TradingState::Short).await.unwrap();
    let open: Vec<_> = trader.open_orders().await.iter().map(|o| o.id()).collect();
    let before = trader.portfolio().lock().await.entries().clone();

    assert!(matches!(
        decider.set_state(TradingState::Short).await,
        Ok(Decision::Unchanged)
    ));
    let after: Vec<_> = trader.open_orders().await.iter().map(|o| o.id()).collect();
    assert_eq!(open, after);
    assert_eq!(&before, trader.portfolio().lock().await.entries());
}

#[tokio::test]
async fn test_new_state_replaces_the_open_orders() {
    let events = EventBus::new();
    let trader = create_test_trader(create_test_gateway(true), events.clone());
    let mut decider = create_test_decider(trader.clone(), 1.0, events);

    decider.set_final_eval(0.65);
    decider.set_state(TradingState::Short).await.unwrap();

    decider.set_final_eval(-0.65);
    let Decision::Changed { outcome, .. } = decider.set_state(TradingState::Long).await.unwrap()
    else {
        panic!("state should change");
    };
    assert_eq!(outcome.placed.len(), 1);
    assert_eq!(outcome.placed[0].side(), Side::Buy);
    assert_eq!(outcome.placed[0].origin_price(), dec!(6890.06954875));

    let open = trader.open_orders().await;
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].id(), outcome.placed[0].id());
    let portfolio = trader.portfolio();
    let btc = portfolio.lock().await.get_currency_portfolio("BTC");
    assert_eq!(btc.available, dec!(10));
    assert_eq!(trader.trade_history(None).await.len(), 2);
}

#[tokio::test]
async fn test_neutral_keeps_the_open_orders() {
    let events = EventBus::new();
    let trader = create_test_trader(create_test_gateway(true), events.clone());
    let mut decider = create_test_decider(trader.clone(), 1.0, events);

    decider.set_final_eval(0.65);
    decider.set_state(TradingState::Short).await.unwrap();
    let Decision::Changed { outcome, .. } = decider.set_state(TradingState::Neutral).await.unwrap()
    else {
        panic!("state should change");
    };
    assert!(outcome.placed.is_empty());
    assert_eq!(trader.open_orders().await.len(), 2);
}

#[tokio::test]
async fn test_insufficient_balance_refreshes_and_retries_once() {
    let gateway = create_test_gateway(false);
    gateway.set_balance("BTC", dec!(1));
    let events = EventBus::new();
    let mut listener = events.subscribe();
    let trader = create_test_trader(gateway.clone(), events.clone());
    assert!(!trader.is_simulated());
    let mut decider = create_test_decider(trader.clone(), 1.0, events);

    decider.set_final_eval(0.65);
    let Decision::Changed { outcome, .. } = decider.set_state(TradingState::Short).await.unwrap()
    else {
        panic!("state should change");
    };
    assert!(outcome.placed.is_empty());
    let indices: Vec<usize> = outcome.failed.iter().map(|(i, _)| *i).collect();
    assert_eq!(indices, vec![0, 1]);
    assert!(outcome
        .failed
        .iter()
        .all(|(_, e)| matches!(e, TradingError::InsufficientBalance { .. })));

    let portfolio = trader.portfolio();
    assert_eq!(portfolio.lock().await.get_currency_portfolio("BTC").total, dec!(1));
    assert_eq!(gateway.get_balance().await.unwrap()["BTC"].available, dec!(1));

    let mut refreshed = false;
    while let Ok(event) = listener.try_recv() {
        refreshed |= matches!(event, BotEvent::PortfolioRefreshed { .. });
    }
    assert!(refreshed);
}

#[tokio::test]
async fn test_disabled_trading_only_records_the_state() {
    let gateway = create_test_gateway(true);
    let events = EventBus::new();
    let mut listener = events.subscribe();
    let trader = create_test_trader(gateway.clone(), events.clone());
    let mut decider =
        create_test_decider(trader.clone(), 0.5, events).with_trading_enabled(false);

    decider.set_final_eval(0.65);
    let Decision::Changed { state, outcome } = decider.decide().await.unwrap() else {
        panic!("state should change");
    };
    assert_eq!(state, TradingState::VeryShort);
    assert!(outcome.placed.is_empty());
    assert!(outcome.failed.is_empty());
    assert!(trader.open_orders().await.is_empty());
    assert_eq!(gateway.calls(), 0);

    let btc = trader.portfolio().lock().await.get_currency_portfolio("BTC");
    assert_eq!(btc.available, dec!(10));
    assert!(matches!(
        listener.try_recv().unwrap(),
        BotEvent::StateChanged { state: TradingState::VeryShort, .. }
    ));
}
