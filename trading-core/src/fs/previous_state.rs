//! Previous trading state.
//!
//! Lets a restarted bot resume from its last portfolio and trade history
//! instead of starting cold. The file is a JSON map of exchange name to
//! `ExchangeTradingState`.

use super::persistence::{load_state, remove_state, save_state};
use anyhow::{bail, Result};
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use trading::{Symbol, Trade};

/// Trades kept per history; older ones are dropped from the saved state.
pub const MAX_SAVED_TRADES: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExchangeTradingState {
    pub simulated_initial_portfolio: Option<HashMap<String, Decimal>>,
    pub real_initial_portfolio: Option<HashMap<String, Decimal>>,
    pub simulated_current_portfolio: Option<HashMap<String, Decimal>>,
    pub simulated_trade_history: Vec<Trade>,
    pub real_trade_history: Vec<Trade>,
    pub simulated_initial_value: Option<Decimal>,
    pub real_initial_value: Option<Decimal>,
    pub watched_markets_initial_values: Option<HashMap<Symbol, Decimal>>,
    pub reference_market: Option<String>,
}

/// A partial update of one exchange's saved state.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    /// Latest simulated holdings (asset totals).
    SimulatedPortfolio(HashMap<String, Decimal>),
    SimulatedInitialPortfolio(HashMap<String, Decimal>),
    RealInitialPortfolio(HashMap<String, Decimal>),
    SimulatedInitialValue(Decimal),
    RealInitialValue(Decimal),
    WatchedMarketsInitialValues(HashMap<Symbol, Decimal>),
    /// Appended to the simulated or real history depending on the trade.
    Trade(Trade),
}

/// Serializes the file writes and drops snapshots older than the one on disk.
#[derive(Debug, Default)]
struct StateWriter {
    written: Mutex<u64>,
}

impl StateWriter {
    fn write(&self, generation: u64, path: &Path, states: &HashMap<String, ExchangeTradingState>) {
        let mut written = self.written.lock().unwrap_or_else(|e| e.into_inner());
        if *written > generation {
            return;
        }
        if let Err(e) = save_state(path, states) {
            error!("Error when saving trading state: {:#}", e);
        }
        *written = generation;
    }
}

pub struct PreviousStateManager {
    path: PathBuf,
    reference_market: String,
    states: HashMap<String, ExchangeTradingState>,
    first_data: bool,
    writer: Arc<StateWriter>,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl PreviousStateManager {
    /// Loads the saved state at `path`, or prepares a fresh one.
    ///
    /// The saved state is discarded when it cannot be read, when one of
    /// `exchanges` is missing, when its watched markets differ from
    /// `watched_symbols` or when it was valued in another reference market.
    /// `reset` deletes the file before anything is read.
    pub fn new(
        path: impl Into<PathBuf>,
        exchanges: &[String],
        watched_symbols: &[Symbol],
        reference_market: impl Into<String>,
        reset: bool,
    ) -> Self {
        let path = path.into();
        let reference_market = reference_market.into();

        if reset {
            match remove_state(&path) {
                Ok(()) => info!("Previous trading state reset ({})", path.display()),
                Err(e) => error!("Failed to reset previous trading state: {:#}", e),
            }
        }

        let watched: BTreeSet<&Symbol> = watched_symbols.iter().collect();
        let loaded = if reset || !path.exists() {
            None
        } else {
            match Self::load(&path, exchanges, &watched, &reference_market) {
                Ok(states) => Some(states),
                Err(e) => {
                    warn!("Impossible to start from the previous trading state: {:#}", e);
                    None
                }
            }
        };

        let first_data = loaded.is_none();
        let states = loaded.unwrap_or_else(|| {
            exchanges
                .iter()
                .map(|name| {
                    let state = ExchangeTradingState {
                        reference_market: Some(reference_market.clone()),
                        ..Default::default()
                    };
                    (name.clone(), state)
                })
                .collect()
        });

        Self {
            path,
            reference_market,
            states,
            first_data,
            writer: Arc::new(StateWriter::default()),
            generation: 0,
            pending: None,
        }
    }

    fn load(
        path: &Path,
        exchanges: &[String],
        watched: &BTreeSet<&Symbol>,
        reference_market: &str,
    ) -> Result<HashMap<String, ExchangeTradingState>> {
        let states: HashMap<String, ExchangeTradingState> = load_state(path)?;

        let missing: Vec<&str> = exchanges
            .iter()
            .filter(|name| !states.contains_key(*name))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            bail!("missing historical data from exchange(s): {}", missing.join(", "));
        }

        for (name, state) in &states {
            let Some(values) = &state.watched_markets_initial_values else {
                bail!("{}: missing watched markets initial values", name);
            };
            let saved: BTreeSet<&Symbol> = values.keys().collect();
            if &saved != watched {
                bail!("{}: watched markets changed since the last run", name);
            }
            if state.reference_market.as_deref() != Some(reference_market) {
                bail!(
                    "{}: reference market changed from {:?} to {}",
                    name,
                    state.reference_market,
                    reference_market
                );
            }
        }
        Ok(states)
    }

    /// True when no usable previous state was found and the bot starts cold.
    pub fn should_initialize_data(&self) -> bool {
        self.first_data
    }

    pub fn get(&self, exchange: &str) -> Option<&ExchangeTradingState> {
        self.states.get(exchange)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `update` to `exchange` and saves the whole state.
    ///
    /// Inside a tokio runtime the file is written on the blocking pool; see
    /// `take_pending_write`. Save failures are logged; trading carries on
    /// without persistence.
    pub fn update(&mut self, exchange: &str, update: StateUpdate) {
        let reference_market = self.reference_market.clone();
        let state = self
            .states
            .entry(exchange.to_string())
            .or_insert_with(|| ExchangeTradingState {
                reference_market: Some(reference_market),
                ..Default::default()
            });

        match update {
            StateUpdate::SimulatedPortfolio(p) => state.simulated_current_portfolio = Some(p),
            StateUpdate::SimulatedInitialPortfolio(p) => state.simulated_initial_portfolio = Some(p),
            StateUpdate::RealInitialPortfolio(p) => state.real_initial_portfolio = Some(p),
            StateUpdate::SimulatedInitialValue(v) => state.simulated_initial_value = Some(v),
            StateUpdate::RealInitialValue(v) => state.real_initial_value = Some(v),
            StateUpdate::WatchedMarketsInitialValues(v) => {
                state.watched_markets_initial_values = Some(v)
            }
            StateUpdate::Trade(trade) => {
                let history = if trade.is_simulated() {
                    &mut state.simulated_trade_history
                } else {
                    &mut state.real_trade_history
                };
                history.push(trade);
                if history.len() > MAX_SAVED_TRADES {
                    let excess = history.len() - MAX_SAVED_TRADES;
                    history.drain(..excess);
                }
            }
        }
        self.save();
    }

    fn save(&mut self) {
        self.generation += 1;
        let generation = self.generation;
        let writer = self.writer.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let path = self.path.clone();
                let snapshot = self.states.clone();
                self.pending = Some(runtime.spawn_blocking(move || {
                    writer.write(generation, &path, &snapshot)
                }));
            }
            Err(_) => writer.write(generation, &self.path, &self.states),
        }
    }

    /// The write of the latest update, if it may still be running. Once it
    /// completes the file holds every update applied so far.
    pub fn take_pending_write(&mut self) -> Option<JoinHandle<()>> {
        self.pending.take()
    }
}
