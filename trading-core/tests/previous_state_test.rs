use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::path::PathBuf;
use trading::{Order, OrderKind, Side, Symbol, Trade};
use trading_core::fs::{PreviousStateManager, StateUpdate, MAX_SAVED_TRADES};

fn scratch_file() -> PathBuf {
    std::env::temp_dir()
        .join(format!("previous-state-{}", uuid::Uuid::new_v4()))
        .join("trading_state.json")
}

fn symbols() -> Vec<Symbol> {
    vec![Symbol::new("BTC", "USDT"), Symbol::new("ETH", "USDT")]
}

fn exchanges() -> Vec<String> {
    vec!["binance".to_string()]
}

/// Writes a complete state for `binance` and returns its path.
fn seeded_state() -> PathBuf {
    let path = scratch_file();
    let mut manager = PreviousStateManager::new(&path, &exchanges(), &symbols(), "USDT", false);
    assert!(manager.should_initialize_data());

    let watched: HashMap<Symbol, _> = symbols()
        .into_iter()
        .zip([dec!(6943.01), dec!(210.5)])
        .collect();
    manager.update("binance", StateUpdate::WatchedMarketsInitialValues(watched));
    manager.update(
        "binance",
        StateUpdate::SimulatedPortfolio([("BTC".to_string(), dec!(10))].into()),
    );

    let mut order = Order::new(Symbol::new("BTC", "USDT"), Side::Buy, OrderKind::Market, dec!(1), dec!(6943.01))
        .with_simulated(true);
    order.mark_filled(dec!(6943.01), dec!(1), None, 10);
    manager.update("binance", StateUpdate::Trade(Trade::from_order("binance", &order)));
    path
}

#[test]
fn test_warm_start_restores_the_saved_state() {
    let path = seeded_state();
    let manager = PreviousStateManager::new(&path, &exchanges(), &symbols(), "USDT", false);

    assert!(!manager.should_initialize_data());
    let state = manager.get("binance").unwrap();
    assert_eq!(state.simulated_current_portfolio.as_ref().unwrap()["BTC"], dec!(10));
    assert_eq!(state.simulated_trade_history.len(), 1);
    assert!(state.real_trade_history.is_empty());
    assert_eq!(state.reference_market.as_deref(), Some("USDT"));
}

#[test]
fn test_changed_symbol_set_invalidates_the_snapshot() {
    let path = seeded_state();
    let fewer = vec![Symbol::new("BTC", "USDT")];
    let manager = PreviousStateManager::new(&path, &exchanges(), &fewer, "USDT", false);

    assert!(manager.should_initialize_data());
    assert!(manager.get("binance").unwrap().simulated_current_portfolio.is_none());
}

#[test]
fn test_changed_reference_market_invalidates_the_snapshot() {
    let path = seeded_state();
    let manager = PreviousStateManager::new(&path, &exchanges(), &symbols(), "BTC", false);
    assert!(manager.should_initialize_data());
}

#[test]
fn test_missing_exchange_invalidates_the_snapshot() {
    let path = seeded_state();
    let more = vec!["binance".to_string(), "kraken".to_string()];
    let manager = PreviousStateManager::new(&path, &more, &symbols(), "USDT", false);
    assert!(manager.should_initialize_data());
    assert!(manager.get("kraken").is_some());
}

#[test]
fn test_corrupted_file_starts_cold() {
    let path = scratch_file();
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let manager = PreviousStateManager::new(&path, &exchanges(), &symbols(), "USDT", false);
    assert!(manager.should_initialize_data());
}

#[test]
fn test_reset_deletes_the_file() {
    let path = seeded_state();
    assert!(path.exists());

    let manager = PreviousStateManager::new(&path, &exchanges(), &symbols(), "USDT", true);
    assert!(manager.should_initialize_data());
    assert!(!path.exists());
}

#[tokio::test]
async fn test_saves_in_the_background_and_caps_the_history() {
    let path = seeded_state();
    let mut manager = PreviousStateManager::new(&path, &exchanges(), &symbols(), "USDT", false);
    assert!(!manager.should_initialize_data());

    for i in 0..MAX_SAVED_TRADES + 5 {
        let mut order = Order::new(Symbol::new("ETH", "USDT"), Side::Sell, OrderKind::Market, dec!(1), dec!(210))
            .with_simulated(true);
        order.mark_filled(dec!(210), dec!(1), None, 100 + i as i64);
        manager.update("binance", StateUpdate::Trade(Trade::from_order("binance", &order)));
    }
    let history = &manager.get("binance").unwrap().simulated_trade_history;
    assert_eq!(history.len(), MAX_SAVED_TRADES);
    // The seeded trade and the five oldest new ones are gone.
    assert!(history.iter().all(|t| t.symbol() == &Symbol::new("ETH", "USDT")));

    manager.take_pending_write().unwrap().await.unwrap();
    assert!(manager.take_pending_write().is_none());
    let reloaded = PreviousStateManager::new(&path, &exchanges(), &symbols(), "USDT", false);
    assert_eq!(
        reloaded.get("binance").unwrap().simulated_trade_history,
        manager.get("binance").unwrap().simulated_trade_history
    );
}
