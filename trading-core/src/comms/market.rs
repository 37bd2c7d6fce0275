//! Market-data dispatcher of one exchange.
//!
//! Each topic has its own `Consumer`. Dequeued events first refresh the
//! exchange-local `MarketCache`, then fan out through the `Producer`
//! registered for their `(topic, symbol)`.

use super::dispatcher::{Consumer, ConsumerQueue, DispatchError, EventHandler, Producer};
use anyhow::Result;
use async_trait::async_trait;
use futures::future::join_all;
use log::{error, info, trace};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::task::JoinHandle;
use trading::{ExecutionReport, MarketEvent, OrderBook, RecentTrade, Symbol, Ticker, Topic};

/// Most recent market state seen by the dispatcher, per symbol.
#[derive(Debug, Default)]
pub struct MarketCache {
    tickers: RwLock<HashMap<Symbol, Ticker>>,
    books: RwLock<HashMap<Symbol, OrderBook>>,
    trades: RwLock<HashMap<Symbol, Vec<RecentTrade>>>,
    order_updates: RwLock<HashMap<Symbol, ExecutionReport>>,
}

impl MarketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, event: &MarketEvent) {
        match event {
            MarketEvent::Ticker(ticker) => {
                let mut tickers = self.tickers.write().unwrap_or_else(|e| e.into_inner());
                tickers.insert(ticker.symbol.clone(), ticker.clone());
            }
            MarketEvent::OrderBook { symbol, book } => {
                let mut books = self.books.write().unwrap_or_else(|e| e.into_inner());
                books.insert(symbol.clone(), book.clone());
            }
            MarketEvent::RecentTrades { symbol, trades } => {
                let mut cached = self.trades.write().unwrap_or_else(|e| e.into_inner());
                cached.insert(symbol.clone(), trades.clone());
            }
            MarketEvent::OrderUpdate { symbol, report } => {
                let mut updates = self.order_updates.write().unwrap_or_else(|e| e.into_inner());
                updates.insert(symbol.clone(), report.clone());
            }
        }
    }

    pub fn ticker(&self, symbol: &Symbol) -> Option<Ticker> {
        let tickers = self.tickers.read().unwrap_or_else(|e| e.into_inner());
        tickers.get(symbol).cloned()
    }

    pub fn order_book(&self, symbol: &Symbol) -> Option<OrderBook> {
        let books = self.books.read().unwrap_or_else(|e| e.into_inner());
        books.get(symbol).cloned()
    }

    pub fn recent_trades(&self, symbol: &Symbol) -> Vec<RecentTrade> {
        let trades = self.trades.read().unwrap_or_else(|e| e.into_inner());
        trades.get(symbol).cloned().unwrap_or_default()
    }

    pub fn last_order_update(&self, symbol: &Symbol) -> Option<ExecutionReport> {
        let updates = self.order_updates.read().unwrap_or_else(|e| e.into_inner());
        updates.get(symbol).cloned()
    }
}

type ProducerMap = RwLock<HashMap<(Topic, Symbol), Arc<Producer<MarketEvent>>>>;

struct MarketHandler {
    topic: Topic,
    cache: Arc<MarketCache>,
    producers: Arc<ProducerMap>,
}

#[async_trait]
impl EventHandler<MarketEvent> for MarketHandler {
    async fn handle(&self, event: MarketEvent) -> Result<()> {
        self.cache.apply(&event);

        let producer = {
            let producers = self.producers.read().unwrap_or_else(|e| e.into_inner());
            producers
                .get(&(self.topic, event.symbol().clone()))
                .cloned()
        };
        match producer {
            Some(producer) => {
                let delivered = producer.send(&event);
                trace!("{} {} delivered to {}", self.topic, event.symbol(), delivered);
            }
            None => trace!("{} {}: no subscriber", self.topic, event.symbol()),
        }
        Ok(())
    }
}

pub struct MarketDispatcher {
    exchange: String,
    consumers: HashMap<Topic, Consumer<MarketEvent>>,
    queues: HashMap<Topic, ConsumerQueue<MarketEvent>>,
    producers: Arc<ProducerMap>,
    cache: Arc<MarketCache>,
    handles: Vec<JoinHandle<()>>,
}

impl MarketDispatcher {
    pub fn new(exchange: impl Into<String>) -> Self {
        let exchange = exchange.into();
        let cache = Arc::new(MarketCache::new());
        let producers: Arc<ProducerMap> = Arc::new(RwLock::new(HashMap::new()));

        let mut consumers = HashMap::new();
        let mut queues = HashMap::new();
        for topic in Topic::ALL {
            let handler = Arc::new(MarketHandler {
                topic,
                cache: cache.clone(),
                producers: producers.clone(),
            });
            let consumer = Consumer::new(format!("{}:{}", exchange, topic), handler);
            queues.insert(topic, consumer.queue());
            consumers.insert(topic, consumer);
        }

        Self {
            exchange,
            consumers,
            queues,
            producers,
            cache,
            handles: Vec::new(),
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn cache(&self) -> Arc<MarketCache> {
        self.cache.clone()
    }

    /// Registers `queue` for every event on `(topic, symbol)`.
    pub fn subscribe(&self, topic: Topic, symbol: Symbol, queue: ConsumerQueue<MarketEvent>) {
        let mut producers = self.producers.write().unwrap_or_else(|e| e.into_inner());
        producers
            .entry((topic, symbol))
            .or_insert_with(|| Arc::new(Producer::new()))
            .subscribe(queue);
    }

    /// Enqueues an inbound event on its topic consumer.
    pub fn publish(&self, event: MarketEvent) -> Result<(), DispatchError> {
        let topic = event.topic();
        self.queues
            .get(&topic)
            .ok_or_else(|| DispatchError::UnknownTopic(topic.to_string()))?
            .push(event)
    }

    pub fn start(&mut self) -> Result<(), DispatchError> {
        for consumer in self.consumers.values_mut() {
            self.handles.push(consumer.start()?);
        }
        info!("Market dispatcher for {} started", self.exchange);
        Ok(())
    }

    /// Cooperative: events being handled finish, queued ones are skipped.
    pub fn stop(&self) {
        for consumer in self.consumers.values() {
            consumer.stop();
        }
    }

    /// Waits for every consumer loop to exit. Call after `stop`.
    pub async fn join(&mut self) {
        for result in join_all(self.handles.drain(..)).await {
            if let Err(e) = result {
                error!("Dispatcher {} consumer panicked: {}", self.exchange, e);
            }
        }
        info!("Market dispatcher for {} stopped", self.exchange);
    }
}
