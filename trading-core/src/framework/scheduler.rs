use super::readiness::Readiness;
use super::stop::StopSignal;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error, info};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use trading::{Symbol, TimeFrame};

/// Identity of one scheduler: an (exchange, symbol, time frame) triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchedulerKey {
    exchange: String,
    symbol: Symbol,
    time_frame: TimeFrame,
}

impl SchedulerKey {
    pub fn new(exchange: impl Into<String>, symbol: Symbol, time_frame: TimeFrame) -> Self {
        Self {
            exchange: exchange.into(),
            symbol,
            time_frame,
        }
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &Symbol {
        &self.symbol
    }

    pub fn time_frame(&self) -> TimeFrame {
        self.time_frame
    }
}

impl fmt::Display for SchedulerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.exchange, self.symbol, self.time_frame)
    }
}

/// One evaluate -> aggregate -> decide pass for a scheduler key.
#[async_trait]
pub trait DecisionCycle: Send + Sync {
    async fn run_cycle(&self, key: &SchedulerKey) -> Result<()>;
}

/// Cloneable handle that requests cycles of one scheduler from elsewhere,
/// e.g. a market data consumer.
#[derive(Debug, Clone)]
pub struct SchedulerTrigger {
    wake: Arc<Notify>,
}

impl SchedulerTrigger {
    pub fn trigger(&self) {
        self.wake.notify_one();
    }
}

/// Drives the decision cycle of one (exchange, symbol, time frame).
///
/// The scheduler guarantees:
/// 1. At most one cycle in flight for its key.
/// 2. Triggers received while a cycle runs collapse into a single re-run.
/// 3. A completed cycle marks its time frame in the shared `Readiness`.
///
/// Coalescing relies on `Notify::notify_one`, which stores at most one
/// pending wakeup no matter how many times it is called.
pub struct TaskScheduler {
    key: SchedulerKey,
    cycle: Arc<dyn DecisionCycle>,
    readiness: Readiness,
    wake: Arc<Notify>,
    stop: StopSignal,
    completed: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TaskScheduler {
    /// Creates a scheduler.
    ///
    /// # Arguments
    ///
    /// * `key` - The (exchange, symbol, time frame) it is responsible for.
    /// * `cycle` - The work executed on every trigger.
    /// * `readiness` - Readiness shared by every scheduler of the symbol.
    pub fn new(key: SchedulerKey, cycle: Arc<dyn DecisionCycle>, readiness: Readiness) -> Self {
        Self {
            key,
            cycle,
            readiness,
            wake: Arc::new(Notify::new()),
            stop: StopSignal::new(),
            completed: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn key(&self) -> &SchedulerKey {
        &self.key
    }

    /// Requests a cycle (candle close, forced refresh).
    pub fn trigger(&self) {
        self.wake.notify_one();
    }

    pub fn trigger_handle(&self) -> SchedulerTrigger {
        SchedulerTrigger {
            wake: self.wake.clone(),
        }
    }

    /// Number of cycles that completed successfully.
    pub fn completed_cycles(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Whether a cycle is currently executing.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Launches the scheduling loop as a background task. No-op if started.
    pub fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }
        info!("Scheduler {} starting", self.key);

        let key = self.key.clone();
        let cycle = self.cycle.clone();
        let readiness = self.readiness.clone();
        let wake = self.wake.clone();
        let stop = self.stop.clone();
        let completed = self.completed.clone();
        let running = self.running.clone();

        self.handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = stop.stopped() => break,
                    _ = wake.notified() => {}
                }
                if stop.is_stopped() {
                    break;
                }

                running.store(true, Ordering::Release);
                let outcome = cycle.run_cycle(&key).await;
                running.store(false, Ordering::Release);

                match outcome {
                    Ok(()) => {
                        completed.fetch_add(1, Ordering::AcqRel);
                        readiness.mark_completed(key.time_frame());
                        debug!("Scheduler {}: cycle completed", key);
                    }
                    Err(e) => error!("Scheduler {}: cycle failed: {:#}", key, e),
                }
            }
            info!("Scheduler {} stopped", key);
        }));
    }

    /// Asks the loop to exit. A running cycle is awaited, never aborted.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Stops the loop and waits for it to drain.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Scheduler {} task ended abnormally: {}", self.key, e);
            }
        }
    }
}
