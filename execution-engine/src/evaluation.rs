use crate::decider::{Decision, TradingStateDecider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use log::{debug, error};
use std::collections::HashMap;
use std::sync::Arc;
use strategy_lab::{
    finalize, MatrixHistory, ProducerContext, SharedMatrix, SignalProducer, StrategyAggregator,
};
use tokio::sync::Mutex;
use trading::{Gateway, Symbol, TimeFrame};
use trading_core::comms::MarketCache;
use trading_core::framework::{BotEvent, DecisionCycle, EventBus, SchedulerKey};

/// Evaluation and decision of one symbol, shared by its time-frame schedulers.
///
/// A cycle refreshes the producers of its time frame, writes their notes,
/// aggregates the matrix, records it and lets the decider act on the score.
pub struct SymbolEvaluator {
    symbol: Symbol,
    gateway: Arc<dyn Gateway>,
    cache: Option<Arc<MarketCache>>,
    matrix: SharedMatrix,
    producers: HashMap<TimeFrame, Mutex<Vec<Box<dyn SignalProducer>>>>,
    strategy: Box<dyn StrategyAggregator>,
    history: std::sync::Mutex<MatrixHistory>,
    decider: Mutex<TradingStateDecider>,
    events: EventBus,
}

impl SymbolEvaluator {
    pub fn new(
        symbol: Symbol,
        gateway: Arc<dyn Gateway>,
        producers: HashMap<TimeFrame, Vec<Box<dyn SignalProducer>>>,
        strategy: Box<dyn StrategyAggregator>,
        decider: TradingStateDecider,
        events: EventBus,
        history_size: usize,
    ) -> Self {
        Self {
            symbol,
            gateway,
            cache: None,
            matrix: SharedMatrix::new(),
            producers: producers
                .into_iter()
                .map(|(tf, producers)| (tf, Mutex::new(producers)))
                .collect(),
            strategy,
            history: std::sync::Mutex::new(MatrixHistory::new(history_size)),
            decider: Mutex::new(decider),
            events,
        }
    }

    /// Reads market data from the dispatcher cache before asking the gateway.
    pub fn with_cache(mut self, cache: Arc<MarketCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn matrix(&self) -> &SharedMatrix {
        &self.matrix
    }

    pub fn history_len(&self) -> usize {
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn decider(&self) -> &Mutex<TradingStateDecider> {
        &self.decider
    }

    async fn context(&self, time_frame: TimeFrame) -> ProducerContext {
        let cached_ticker = self.cache.as_ref().and_then(|c| c.ticker(&self.symbol));
        let ticker = match cached_ticker {
            Some(ticker) => Some(ticker),
            None => self.gateway.get_price_ticker(&self.symbol).await.ok(),
        };

        let cached_trades = self
            .cache
            .as_ref()
            .map(|c| c.recent_trades(&self.symbol))
            .unwrap_or_default();
        let trades = if cached_trades.is_empty() {
            match self.gateway.get_recent_trades(&self.symbol).await {
                Ok(trades) => trades,
                Err(e) => {
                    debug!("{}: no recent trades: {}", self.symbol, e);
                    Vec::new()
                }
            }
        } else {
            cached_trades
        };

        ProducerContext::new(self.symbol.clone(), time_frame)
            .with_ticker(ticker)
            .with_recent_trades(trades)
    }
}

#[async_trait]
impl DecisionCycle for SymbolEvaluator {
    async fn run_cycle(&self, key: &SchedulerKey) -> Result<()> {
        let time_frame = key.time_frame();
        let ctx = self.context(time_frame).await;

        if let Some(producers) = self.producers.get(&time_frame) {
            let mut producers = producers.lock().await;
            for producer in producers.iter_mut() {
                match producer.refresh(&ctx).await {
                    Ok(note) => {
                        self.matrix
                            .set_evaluator_eval_type(producer.name(), producer.eval_type());
                        self.matrix.set_eval(
                            producer.category(),
                            producer.name(),
                            note,
                            producer.time_frame(),
                        );
                    }
                    Err(e) => {
                        error!("{}: producer {} failed: {:#}", key, producer.name(), e);
                        self.events
                            .publish(BotEvent::error(producer.name(), format!("{:#}", e)));
                    }
                }
            }
        }

        let score = finalize(&self.matrix, self.strategy.as_ref());
        self.history
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .record(self.matrix.snapshot());

        let mut decider = self.decider.lock().await;
        decider.set_final_eval(score);
        match decider.decide().await {
            Ok(Decision::Changed { state, outcome }) => debug!(
                "{}: now {} with {} orders placed, {} failed",
                key,
                state,
                outcome.placed.len(),
                outcome.failed.len()
            ),
            Ok(_) => {}
            Err(e) if e.is_fatal() => {
                self.events.publish(BotEvent::error("decider", e.to_string()));
                return Err(e).with_context(|| format!("{}: decision failed", key));
            }
            Err(e) => {
                error!("{}: decision failed: {}", key, e);
                self.events.publish(BotEvent::error("decider", e.to_string()));
            }
        }
        Ok(())
    }
}
