use crate::matrix::{Category, NoteValue};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use trading::{RecentTrade, Symbol, Ticker, TimeFrame};

/// Market data handed to producers on each refresh.
#[derive(Debug, Clone)]
pub struct ProducerContext {
    pub symbol: Symbol,
    pub time_frame: TimeFrame,
    pub ticker: Option<Ticker>,
    pub recent_trades: Vec<RecentTrade>,
}

impl ProducerContext {
    pub fn new(symbol: Symbol, time_frame: TimeFrame) -> Self {
        Self {
            symbol,
            time_frame,
            ticker: None,
            recent_trades: Vec::new(),
        }
    }

    pub fn with_ticker(mut self, ticker: Option<Ticker>) -> Self {
        self.ticker = ticker;
        self
    }

    pub fn with_recent_trades(mut self, trades: Vec<RecentTrade>) -> Self {
        self.recent_trades = trades;
        self
    }
}

/// A source of evaluation notes for one symbol.
#[async_trait]
pub trait SignalProducer: Send {
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    /// Time frame the note is stored under, `None` for time-frame agnostic notes.
    fn time_frame(&self) -> Option<TimeFrame> {
        None
    }

    fn eval_type(&self) -> &str {
        "float"
    }

    async fn refresh(&mut self, ctx: &ProducerContext) -> Result<NoteValue>;
}

/// A producer whose evaluation blocks (heavy computation, synchronous IO).
pub trait SyncProducer: Send + 'static {
    fn name(&self) -> &str;

    fn category(&self) -> Category;

    fn time_frame(&self) -> Option<TimeFrame> {
        None
    }

    fn evaluate(&mut self, ctx: &ProducerContext) -> Result<NoteValue>;
}

/// Runs a `SyncProducer` on the blocking pool.
///
/// The shared semaphore bounds how many blocking producers run at once.
pub struct BlockingProducer<P> {
    name: String,
    category: Category,
    time_frame: Option<TimeFrame>,
    inner: Arc<Mutex<P>>,
    pool: Arc<Semaphore>,
}

impl<P: SyncProducer> BlockingProducer<P> {
    pub fn new(producer: P, pool: Arc<Semaphore>) -> Self {
        Self {
            name: producer.name().to_string(),
            category: producer.category(),
            time_frame: producer.time_frame(),
            inner: Arc::new(Mutex::new(producer)),
            pool,
        }
    }
}

#[async_trait]
impl<P: SyncProducer> SignalProducer for BlockingProducer<P> {
    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }

    fn time_frame(&self) -> Option<TimeFrame> {
        self.time_frame
    }

    async fn refresh(&mut self, ctx: &ProducerContext) -> Result<NoteValue> {
        let permit = self
            .pool
            .clone()
            .acquire_owned()
            .await
            .context("blocking producer pool closed")?;
        let inner = self.inner.clone();
        let ctx = ctx.clone();

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut producer = inner.lock().unwrap_or_else(|e| e.into_inner());
            producer.evaluate(&ctx)
        })
        .await
        .with_context(|| format!("producer {} panicked", self.name))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct Slow {
        active: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl SyncProducer for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn category(&self) -> Category {
            Category::Ta
        }

        fn evaluate(&mut self, _ctx: &ProducerContext) -> Result<NoteValue> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            Ok(NoteValue::Value(0.25))
        }
    }

    #[tokio::test]
    async fn test_pool_bounds_concurrent_blocking_producers() {
        let _ = env_logger::builder().is_test(true).try_init();
        let pool = Arc::new(Semaphore::new(1));
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let ctx = ProducerContext::new(Symbol::new("BTC", "USDT"), TimeFrame::OneHour);

        let mut tasks = Vec::new();
        for _ in 0..3 {
            let mut producer = BlockingProducer::new(
                Slow {
                    active: active.clone(),
                    peak: peak.clone(),
                },
                pool.clone(),
            );
            let ctx = ctx.clone();
            tasks.push(tokio::spawn(async move { producer.refresh(&ctx).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), NoteValue::Value(0.25));
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }
}
