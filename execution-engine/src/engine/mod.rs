//! # Engine
//!
//! The handle every trading component of one exchange is built from: the
//! configuration, the gateway, the trader owning portfolio and orders, the
//! event bus and the saved trading state. Nothing is reached through a global.

pub mod trader;

pub use trader::{PlacementOutcome, SharedStateManager, Trader};

use crate::decider::TradingStateDecider;
use crate::evaluation::SymbolEvaluator;
use crate::models::Portfolio;
use crate::orders::OrderTimeouts;
use crate::trades::TradesManager;
use log::{info, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use strategy_lab::{EvaluatorRegistry, ProducerSettings, SignalProducer};
use tokio::sync::{Mutex, Semaphore};
use trading::{Gateway, Symbol, TradingResult};
use trading_core::comms::MarketCache;
use trading_core::config::BotConfig;
use trading_core::framework::{EventBus, Readiness, SchedulerKey, TaskScheduler};
use trading_core::fs::previous_state::{PreviousStateManager, StateUpdate};

/// Permits of the pool running blocking producers.
const BLOCKING_POOL_SIZE: usize = 4;

/// Capacity of each symbol's matrix history.
const MATRIX_HISTORY_SIZE: usize = 64;

pub struct Engine {
    config: Arc<BotConfig>,
    gateway: Arc<dyn Gateway>,
    trader: Arc<Trader>,
    events: EventBus,
    state: SharedStateManager,
    registry: Arc<EvaluatorRegistry>,
    blocking_pool: Arc<Semaphore>,
}

impl Engine {
    /// Builds the trader of `gateway` and restores or initializes its state.
    ///
    /// A simulated exchange resumes from the saved holdings, else starts from
    /// the configured starting portfolio. A real one always reads its
    /// balances from the exchange.
    pub async fn new(
        config: BotConfig,
        gateway: Arc<dyn Gateway>,
        state: PreviousStateManager,
        registry: EvaluatorRegistry,
        events: EventBus,
    ) -> TradingResult<Self> {
        let exchange = gateway.name().to_string();
        let simulated = gateway.is_simulated();
        let cold_start = state.should_initialize_data();
        let saved = state.get(&exchange).cloned().unwrap_or_default();

        let portfolio = if simulated {
            let totals = match saved.simulated_current_portfolio.clone() {
                Some(totals) if !cold_start => {
                    info!("{}: resuming from the saved simulated portfolio", exchange);
                    totals
                }
                _ => config.simulator().starting_portfolio.clone(),
            };
            Portfolio::from_totals(&totals)
        } else {
            Portfolio::from_entries(gateway.get_balance().await?)
        };

        let history = if cold_start {
            Vec::new()
        } else if simulated {
            saved.simulated_trade_history.clone()
        } else {
            saved.real_trade_history.clone()
        };
        if !history.is_empty() {
            info!("{}: restored {} trades", exchange, history.len());
        }

        let state: SharedStateManager = Arc::new(std::sync::Mutex::new(state));
        let trader = Trader::new(gateway.clone(), Arc::new(Mutex::new(portfolio)), events.clone())
            .with_fee_rate(config.simulator().fee_rate)
            .with_timeouts(OrderTimeouts::from(&config.timeouts()))
            .with_trades(TradesManager::from_history(history))
            .with_state(state.clone());

        let engine = Self {
            config: Arc::new(config),
            gateway,
            trader: Arc::new(trader),
            events,
            state,
            registry: Arc::new(registry),
            blocking_pool: Arc::new(Semaphore::new(BLOCKING_POOL_SIZE)),
        };
        if cold_start {
            engine.initialize_state().await;
            engine.flush_state().await;
        }
        Ok(engine)
    }

    /// Waits until the saved state holds every update applied so far.
    pub async fn flush_state(&self) {
        let pending = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take_pending_write();
        if let Some(write) = pending {
            if let Err(e) = write.await {
                warn!("{}: saving the trading state failed: {}", self.exchange(), e);
            }
        }
    }

    /// Records the starting point a later run resumes from.
    async fn initialize_state(&self) {
        let totals = self.trader.portfolio().lock().await.totals();
        let value = self.portfolio_value(&totals).await;
        let watched = self.watched_markets_values().await;
        info!(
            "{}: initial portfolio worth {} {}",
            self.exchange(),
            value,
            self.config.reference_market()
        );

        let updates = if self.gateway.is_simulated() {
            vec![
                StateUpdate::SimulatedInitialPortfolio(totals.clone()),
                StateUpdate::SimulatedPortfolio(totals),
                StateUpdate::SimulatedInitialValue(value),
            ]
        } else {
            vec![
                StateUpdate::RealInitialPortfolio(totals),
                StateUpdate::RealInitialValue(value),
            ]
        };
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        for update in updates {
            state.update(self.exchange(), update);
        }
        state.update(
            self.exchange(),
            StateUpdate::WatchedMarketsInitialValues(watched),
        );
    }

    /// Value of `totals` in the reference market. Assets without a price
    /// are left out.
    pub async fn portfolio_value(&self, totals: &HashMap<String, Decimal>) -> Decimal {
        let reference = self.config.reference_market();
        let mut value = Decimal::ZERO;
        for (asset, amount) in totals {
            if asset == reference {
                value += *amount;
                continue;
            }
            if amount.is_zero() {
                continue;
            }
            let symbol = Symbol::new(asset.as_str(), reference);
            match self.gateway.get_price_ticker(&symbol).await {
                Ok(ticker) => value += *amount * ticker.last,
                Err(e) => warn!("{}: cannot value {}: {}", self.exchange(), asset, e),
            }
        }
        value
    }

    async fn watched_markets_values(&self) -> HashMap<Symbol, Decimal> {
        let mut values = HashMap::new();
        for symbol in self.config.symbols() {
            let price = match self.gateway.get_price_ticker(symbol).await {
                Ok(ticker) => ticker.last,
                Err(e) => {
                    warn!("{}: no initial price for {}: {}", self.exchange(), symbol, e);
                    Decimal::ZERO
                }
            };
            values.insert(symbol.clone(), price);
        }
        values
    }

    pub fn exchange(&self) -> &str {
        self.trader.exchange()
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn trader(&self) -> &Arc<Trader> {
        &self.trader
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn state(&self) -> &SharedStateManager {
        &self.state
    }

    pub fn registry(&self) -> &EvaluatorRegistry {
        &self.registry
    }

    /// Wires the producers, strategy and decider of `symbol`.
    ///
    /// Producers without a time frame are only refreshed with the first one.
    pub fn create_evaluator(
        &self,
        symbol: Symbol,
        readiness: Readiness,
        cache: Option<Arc<MarketCache>>,
    ) -> TradingResult<Arc<SymbolEvaluator>> {
        let time_frames = self.config.time_frames();
        let mut producers: HashMap<_, Vec<Box<dyn SignalProducer>>> = HashMap::new();
        for (position, time_frame) in time_frames.iter().enumerate() {
            let settings = ProducerSettings::new(*time_frame, self.blocking_pool.clone());
            let mut created = Vec::new();
            for name in self.config.evaluators() {
                let producer = self.registry.create_producer(name, &settings)?;
                if producer.time_frame().is_none() && position > 0 {
                    continue;
                }
                created.push(producer);
            }
            producers.insert(*time_frame, created);
        }
        let strategy = self
            .registry
            .create_strategy(self.config.strategy(), self.config.category_weights())?;

        let decider = TradingStateDecider::new(
            symbol.clone(),
            self.config.risk(),
            self.trader.clone(),
            readiness,
            self.events.clone(),
        )
        .with_sub_portfolio(self.config.trading().sub_portfolio_percent)
        .with_trading_enabled(self.config.is_trading_enabled());

        let evaluator = SymbolEvaluator::new(
            symbol,
            self.gateway.clone(),
            producers,
            strategy,
            decider,
            self.events.clone(),
            MATRIX_HISTORY_SIZE,
        );
        Ok(Arc::new(match cache {
            Some(cache) => evaluator.with_cache(cache),
            None => evaluator,
        }))
    }

    /// One scheduler per configured time frame of `symbol`, not started.
    pub fn create_schedulers(
        &self,
        symbol: &Symbol,
        cache: Option<Arc<MarketCache>>,
    ) -> TradingResult<Vec<TaskScheduler>> {
        let readiness = Readiness::new(self.config.time_frames());
        let evaluator = self.create_evaluator(symbol.clone(), readiness.clone(), cache)?;
        Ok(self
            .config
            .time_frames()
            .iter()
            .map(|time_frame| {
                let key = SchedulerKey::new(self.exchange(), symbol.clone(), *time_frame);
                TaskScheduler::new(key, evaluator.clone(), readiness.clone())
            })
            .collect())
    }
}
