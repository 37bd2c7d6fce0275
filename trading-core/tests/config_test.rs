use rust_decimal_macros::dec;
use trading::{Symbol, TimeFrame, TradingError};
use trading_core::config::BotConfig;

const SAMPLE: &str = r#"
symbols = ["BTC/USDT", "ETH/USDT"]
time_frames = ["1h", "4h"]
evaluators = ["instant_fluctuations"]

[trading]
enabled = true
risk = 0.8
reference_market = "usdt"

[simulator]
enabled = true
fee_rate = 0.002

[simulator.starting_portfolio]
BTC = 10
USDT = 2000

[timeouts]
market_fill_secs = 5
"#;

#[test]
fn test_sample_configuration() {
    let config = BotConfig::from_toml_str(SAMPLE).unwrap();

    assert_eq!(config.symbols(), &[Symbol::new("BTC", "USDT"), Symbol::new("ETH", "USDT")]);
    assert_eq!(config.time_frames(), &[TimeFrame::OneHour, TimeFrame::FourHours]);
    assert_eq!(config.risk(), 0.8);
    assert_eq!(config.reference_market(), "USDT");
    assert_eq!(config.simulator().starting_portfolio["BTC"], dec!(10));
    assert_eq!(config.simulator().starting_portfolio["USDT"], dec!(2000));
    assert_eq!(config.simulator().fee_rate, dec!(0.002));
    assert_eq!(config.strategy(), "mixed");
    assert_eq!(config.exchange_names(), vec!["simulated".to_string()]);

    let timeouts = config.timeouts();
    assert_eq!(timeouts.market_fill_secs, 5);
    assert_eq!(timeouts.open_secs, 10);
    assert_eq!(timeouts.poll_interval_ms, 500);
    assert_eq!(config.retry().max_attempts, 3);
}

#[test]
fn test_risk_out_of_range_is_rejected() {
    let doc = SAMPLE.replace("risk = 0.8", "risk = 1.5");
    assert!(matches!(
        BotConfig::from_toml_str(&doc),
        Err(TradingError::Configuration(_))
    ));
}

#[test]
fn test_malformed_symbol_is_rejected() {
    let doc = SAMPLE.replace("\"ETH/USDT\"", "\"ETHUSDT\"");
    assert!(matches!(
        BotConfig::from_toml_str(&doc),
        Err(TradingError::Configuration(_))
    ));
}

#[test]
fn test_empty_symbol_list_is_rejected() {
    let err = BotConfig::default().validate().unwrap_err();
    assert!(err.is_fatal());
}

#[test]
fn test_builders_produce_valid_configuration() {
    let config = BotConfig::default()
        .with_symbols(vec![Symbol::new("BTC", "USDT")])
        .with_risk(1.0);
    assert!(config.validate().is_ok());
    assert_eq!(config.time_frames(), &[TimeFrame::OneHour]);
}

#[test]
fn test_trading_enabled_defaults_to_true() {
    let doc = SAMPLE.replace("enabled = true\nrisk", "risk");
    let config = BotConfig::from_toml_str(&doc).unwrap();
    assert!(config.is_trading_enabled());
    assert!(BotConfig::default().is_trading_enabled());

    let disabled = SAMPLE.replace("enabled = true\nrisk", "enabled = false\nrisk");
    let config = BotConfig::from_toml_str(&disabled).unwrap();
    assert!(!config.is_trading_enabled());
    assert!(config.is_simulated());
}
