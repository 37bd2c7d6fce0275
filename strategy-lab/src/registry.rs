//! Name-based construction of signal producers and strategies.
//!
//! Everything the bot can evaluate with is registered here at startup;
//! configuration refers to entries by name.

use crate::aggregator::{
    InstantSocialReactionStrategy, MixedStrategy, StrategyAggregator, INSTANT_SOCIAL_REACTION,
    MIXED,
};
use crate::producer::{BlockingProducer, SignalProducer};
use crate::producers::{instant_fluctuations, trade_momentum, InstantFluctuations, TradeMomentum};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use trading::{TimeFrame, TradingError, TradingResult};
use trading_core::config::CategoryWeights;

/// Inputs a producer factory may need.
#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub time_frame: TimeFrame,
    /// Worker pool shared by every blocking producer.
    pub blocking_pool: Arc<Semaphore>,
}

impl ProducerSettings {
    pub fn new(time_frame: TimeFrame, blocking_pool: Arc<Semaphore>) -> Self {
        Self {
            time_frame,
            blocking_pool,
        }
    }
}

pub type ProducerFactory = Box<dyn Fn(&ProducerSettings) -> Box<dyn SignalProducer> + Send + Sync>;
pub type StrategyFactory = Box<dyn Fn(CategoryWeights) -> Box<dyn StrategyAggregator> + Send + Sync>;

#[derive(Default)]
pub struct EvaluatorRegistry {
    producers: BTreeMap<String, ProducerFactory>,
    strategies: BTreeMap<String, StrategyFactory>,
}

impl EvaluatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in producer and strategy.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_strategy(MIXED, |weights| Box::new(MixedStrategy::new(weights)));
        registry.register_strategy(INSTANT_SOCIAL_REACTION, |weights| {
            Box::new(InstantSocialReactionStrategy::new(weights))
        });
        registry.register_producer(instant_fluctuations::NAME, |_| {
            Box::new(InstantFluctuations::new())
        });
        registry.register_producer(trade_momentum::NAME, |settings| {
            Box::new(BlockingProducer::new(
                TradeMomentum::new(settings.time_frame),
                settings.blocking_pool.clone(),
            ))
        });
        registry
    }

    pub fn register_producer<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(&ProducerSettings) -> Box<dyn SignalProducer> + Send + Sync + 'static,
    {
        self.producers.insert(name.to_string(), Box::new(factory));
    }

    pub fn register_strategy<F>(&mut self, name: &str, factory: F)
    where
        F: Fn(CategoryWeights) -> Box<dyn StrategyAggregator> + Send + Sync + 'static,
    {
        self.strategies.insert(name.to_string(), Box::new(factory));
    }

    pub fn create_producer(
        &self,
        name: &str,
        settings: &ProducerSettings,
    ) -> TradingResult<Box<dyn SignalProducer>> {
        let factory = self
            .producers
            .get(name)
            .ok_or_else(|| TradingError::config(format!("unknown evaluator: {}", name)))?;
        Ok(factory(settings))
    }

    pub fn create_strategy(
        &self,
        name: &str,
        weights: CategoryWeights,
    ) -> TradingResult<Box<dyn StrategyAggregator>> {
        let factory = self
            .strategies
            .get(name)
            .ok_or_else(|| TradingError::config(format!("unknown strategy: {}", name)))?;
        Ok(factory(weights))
    }

    /// Fails on the first name that is not registered.
    pub fn check(&self, evaluators: &[String], strategy: &str) -> TradingResult<()> {
        if let Some(unknown) = evaluators.iter().find(|n| !self.producers.contains_key(*n)) {
            return Err(TradingError::config(format!("unknown evaluator: {}", unknown)));
        }
        if !self.strategies.contains_key(strategy) {
            return Err(TradingError::config(format!("unknown strategy: {}", strategy)));
        }
        Ok(())
    }

    pub fn producer_names(&self) -> impl Iterator<Item = &str> {
        self.producers.keys().map(String::as_str)
    }

    pub fn strategy_names(&self) -> impl Iterator<Item = &str> {
        self.strategies.keys().map(String::as_str)
    }
}
