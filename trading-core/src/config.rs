//! Bot configuration.
//!
//! Loaded from a TOML file and overridden by `BOT__`-prefixed environment
//! variables (`BOT__TRADING__RISK=0.8`). The core reads it, never writes it.

use config::{Config, Environment, File, FileFormat};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;
use trading::{Symbol, TimeFrame, TradingError, TradingResult};

pub const SIMULATED_EXCHANGE: &str = "simulated";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// When false the bot evaluates and records states but places no order.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default = "default_risk")]
    pub risk: f64,
    #[serde(default = "default_reference_market")]
    pub reference_market: String,
    #[serde(default)]
    pub sub_portfolio_percent: Option<Decimal>,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            risk: default_risk(),
            reference_market: default_reference_market(),
            sub_portfolio_percent: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub starting_portfolio: HashMap<String, Decimal>,
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            starting_portfolio: HashMap::new(),
            fee_rate: default_fee_rate(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
    #[serde(default)]
    pub sandboxed: bool,
}

/// Pertinence of each evaluation category in the final blend.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    #[serde(default = "default_weight")]
    pub ta: f64,
    #[serde(default = "default_weight")]
    pub social: f64,
    #[serde(default = "default_weight")]
    pub real_time: f64,
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self {
            ta: default_weight(),
            social: default_weight(),
            real_time: default_weight(),
        }
    }
}

impl CategoryWeights {
    pub fn total(&self) -> f64 {
        self.ta + self.social + self.real_time
    }
}

/// Budgets of the order-status polling loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_timeout_secs")]
    pub market_fill_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub open_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub cancel_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub edit_secs: u64,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            market_fill_secs: default_timeout_secs(),
            open_secs: default_timeout_secs(),
            cancel_secs: default_timeout_secs(),
            edit_secs: default_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn market_fill(&self) -> Duration {
        Duration::from_secs(self.market_fill_secs)
    }

    pub fn open(&self) -> Duration {
        Duration::from_secs(self.open_secs)
    }

    pub fn cancel(&self) -> Duration {
        Duration::from_secs(self.cancel_secs)
    }

    pub fn edit(&self) -> Duration {
        Duration::from_secs(self.edit_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    trading: TradingConfig,
    #[serde(default)]
    simulator: SimulatorConfig,
    #[serde(default)]
    exchanges: HashMap<String, ExchangeConfig>,
    #[serde(default)]
    symbols: Vec<Symbol>,
    #[serde(default = "default_time_frames")]
    time_frames: Vec<TimeFrame>,
    #[serde(default)]
    evaluators: Vec<String>,
    #[serde(default = "default_strategy")]
    strategy: String,
    #[serde(default)]
    category_weights: CategoryWeights,
    #[serde(default)]
    timeouts: TimeoutConfig,
    #[serde(default)]
    retry: RetryConfig,
    #[serde(default)]
    state_file: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            trading: TradingConfig::default(),
            simulator: SimulatorConfig::default(),
            exchanges: HashMap::new(),
            symbols: Vec::new(),
            time_frames: default_time_frames(),
            evaluators: Vec::new(),
            strategy: default_strategy(),
            category_weights: CategoryWeights::default(),
            timeouts: TimeoutConfig::default(),
            retry: RetryConfig::default(),
            state_file: None,
        }
    }
}

impl BotConfig {
    /// Loads the file at `path`, applies `BOT__*` overrides and validates.
    pub fn load(path: &Path) -> TradingResult<Self> {
        let builder = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix("BOT")
                    .separator("__")
                    .try_parsing(true),
            );
        Self::build(builder)
    }

    /// Parses an in-memory TOML document (no environment overrides).
    pub fn from_toml_str(content: &str) -> TradingResult<Self> {
        Self::build(Config::builder().add_source(File::from_str(content, FileFormat::Toml)))
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> TradingResult<Self> {
        let config = builder
            .build()
            .map_err(|e| TradingError::config(e.to_string()))?;
        let mut bot: BotConfig = config
            .try_deserialize()
            .map_err(|e| TradingError::config(e.to_string()))?;
        bot.normalize();
        bot.validate()?;
        Ok(bot)
    }

    // The config crate lowercases keys; asset names are upper case everywhere else.
    fn normalize(&mut self) {
        self.simulator.starting_portfolio = self
            .simulator
            .starting_portfolio
            .drain()
            .map(|(asset, amount)| (asset.to_uppercase(), amount))
            .collect();
        self.trading.reference_market = self.trading.reference_market.to_uppercase();
    }

    pub fn validate(&self) -> TradingResult<()> {
        if !(0.0..=1.0).contains(&self.trading.risk) {
            return Err(TradingError::config(format!(
                "trading.risk must be within [0, 1], got {}",
                self.trading.risk
            )));
        }
        if self.symbols.is_empty() {
            return Err(TradingError::config("at least one symbol is required"));
        }
        if self.time_frames.is_empty() {
            return Err(TradingError::config("at least one time frame is required"));
        }
        let weights = &self.category_weights;
        if weights.ta < 0.0 || weights.social < 0.0 || weights.real_time < 0.0 {
            return Err(TradingError::config("category weights must be non-negative"));
        }
        if weights.total() <= 0.0 {
            return Err(TradingError::config("category weights must not all be zero"));
        }
        if let Some(percent) = self.trading.sub_portfolio_percent {
            if percent > Decimal::ONE {
                return Err(TradingError::config(
                    "trading.sub_portfolio_percent must not exceed 1",
                ));
            }
        }
        let t = &self.timeouts;
        if [t.market_fill_secs, t.open_secs, t.cancel_secs, t.edit_secs, t.poll_interval_ms]
            .contains(&0)
        {
            return Err(TradingError::config("timeouts must be positive"));
        }
        if self.retry.max_attempts == 0 {
            return Err(TradingError::config("retry.max_attempts must be at least 1"));
        }
        if !self.simulator.enabled && self.exchanges.is_empty() {
            return Err(TradingError::config(
                "real trading requires at least one configured exchange",
            ));
        }
        Ok(())
    }

    pub fn trading(&self) -> &TradingConfig {
        &self.trading
    }

    pub fn simulator(&self) -> &SimulatorConfig {
        &self.simulator
    }

    pub fn exchanges(&self) -> &HashMap<String, ExchangeConfig> {
        &self.exchanges
    }

    /// Names of the exchanges to trade on, sorted. Simulation trades on a
    /// single in-memory exchange when none is configured.
    pub fn exchange_names(&self) -> Vec<String> {
        if self.exchanges.is_empty() {
            return vec![SIMULATED_EXCHANGE.to_string()];
        }
        let names: BTreeSet<&String> = self.exchanges.keys().collect();
        names.into_iter().cloned().collect()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn time_frames(&self) -> &[TimeFrame] {
        &self.time_frames
    }

    pub fn evaluators(&self) -> &[String] {
        &self.evaluators
    }

    pub fn strategy(&self) -> &str {
        &self.strategy
    }

    pub fn category_weights(&self) -> CategoryWeights {
        self.category_weights
    }

    pub fn timeouts(&self) -> TimeoutConfig {
        self.timeouts
    }

    pub fn retry(&self) -> RetryConfig {
        self.retry
    }

    pub fn risk(&self) -> f64 {
        self.trading.risk
    }

    pub fn reference_market(&self) -> &str {
        &self.trading.reference_market
    }

    pub fn is_simulated(&self) -> bool {
        self.simulator.enabled
    }

    /// Location of the previous-state file, resolved against `data_dir`.
    pub fn state_file(&self, data_dir: &Path) -> PathBuf {
        match &self.state_file {
            Some(path) if path.is_absolute() => path.clone(),
            Some(path) => data_dir.join(path),
            None => data_dir.join("trading_state.json"),
        }
    }

    pub fn with_symbols(mut self, symbols: Vec<Symbol>) -> Self {
        self.symbols = symbols;
        self
    }

    pub fn with_time_frames(mut self, time_frames: Vec<TimeFrame>) -> Self {
        self.time_frames = time_frames;
        self
    }

    pub fn with_risk(mut self, risk: f64) -> Self {
        self.trading.risk = risk;
        self
    }

    pub fn with_evaluators(mut self, evaluators: Vec<String>) -> Self {
        self.evaluators = evaluators;
        self
    }

    pub fn with_starting_portfolio(mut self, portfolio: HashMap<String, Decimal>) -> Self {
        self.simulator.starting_portfolio = portfolio;
        self
    }

    pub fn with_timeouts(mut self, timeouts: TimeoutConfig) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_simulated(mut self, enabled: bool) -> Self {
        self.simulator.enabled = enabled;
        self
    }

    pub fn with_trading_enabled(mut self, enabled: bool) -> Self {
        self.trading.enabled = enabled;
        self
    }

    pub fn is_trading_enabled(&self) -> bool {
        self.trading.enabled
    }
}

fn default_enabled() -> bool {
    true
}

fn default_risk() -> f64 {
    0.5
}

fn default_reference_market() -> String {
    "USDT".to_string()
}

fn default_fee_rate() -> Decimal {
    Decimal::new(1, 3)
}

fn default_weight() -> f64 {
    1.0
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

fn default_time_frames() -> Vec<TimeFrame> {
    vec![TimeFrame::OneHour]
}

fn default_strategy() -> String {
    "mixed".to_string()
}
