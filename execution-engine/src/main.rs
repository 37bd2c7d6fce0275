use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use env_logger::Env;
use execution_engine::engine::Engine;
use execution_engine::exchange::{RetryingGateway, SimulatedGateway};
use futures::future::join_all;
use log::{error, info, warn};
use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use strategy_lab::EvaluatorRegistry;
use tokio::task::JoinHandle;
use trading::{now_millis, MarketEvent, MarketStatus, RecentTrade, Symbol, Ticker, TimeFrame, Topic};
use trading_core::args::BotArgs;
use trading_core::comms::{Consumer, EventHandler, MarketDispatcher};
use trading_core::config::BotConfig;
use trading_core::framework::{BotEvent, EventBus, SchedulerTrigger, StopSignal, TaskScheduler};
use trading_core::fs::previous_state::PreviousStateManager;

/// Price every simulated market starts its random walk from.
const FEED_START_PRICE: f64 = 100.0;
const FEED_INTERVAL: Duration = Duration::from_secs(1);
const ORDER_REFRESH_INTERVAL: Duration = Duration::from_secs(5);

type SimulatedExchange = RetryingGateway<SimulatedGateway>;

/// Requests a real-time cycle on every ticker of its symbol.
struct TickerTrigger {
    trigger: SchedulerTrigger,
}

#[async_trait]
impl EventHandler<MarketEvent> for TickerTrigger {
    async fn handle(&self, _event: MarketEvent) -> Result<()> {
        self.trigger.trigger();
        Ok(())
    }
}

/// Synthetic market data: a +/- 1% random walk per symbol.
struct RandomFeed {
    prices: HashMap<Symbol, f64>,
}

impl RandomFeed {
    fn new(symbols: &[Symbol], start_price: f64) -> Self {
        Self {
            prices: symbols.iter().map(|s| (s.clone(), start_price)).collect(),
        }
    }

    fn tick(&mut self, gateway: &SimulatedGateway, dispatcher: &MarketDispatcher) {
        let mut rng = rand::thread_rng();
        let now = now_millis();
        for (symbol, price) in self.prices.iter_mut() {
            let change_pct = rng.gen_range(-0.01..0.01);
            *price = (*price * (1.0 + change_pct)).max(0.01);

            let last = Decimal::from_f64(*price).unwrap_or_default().round_dp(2);
            let bid = Decimal::from_f64(*price * 0.999).unwrap_or_default().round_dp(2);
            let ask = Decimal::from_f64(*price * 1.001).unwrap_or_default().round_dp(2);
            let quantity = Decimal::from_f64(rng.gen_range(0.01..1.0))
                .unwrap_or_default()
                .round_dp(4);

            let ticker = Ticker::new(symbol.clone(), last, now).with_spread(bid, ask);
            let trade = RecentTrade::new(last, quantity, now);
            gateway.set_ticker(ticker.clone());
            gateway.push_trade(symbol, trade);

            let events = [
                MarketEvent::Ticker(ticker),
                MarketEvent::RecentTrades {
                    symbol: symbol.clone(),
                    trades: vec![trade],
                },
            ];
            for event in events {
                if let Err(e) = dispatcher.publish(event) {
                    warn!("Dropping market event for {}: {}", symbol, e);
                }
            }
        }
    }
}

fn create_simulated_exchange(config: &BotConfig, name: &str) -> SimulatedExchange {
    let gateway = SimulatedGateway::new(config.simulator().fee_rate).with_name(name);
    let start = Decimal::from_f64(FEED_START_PRICE).unwrap_or(Decimal::ONE_HUNDRED);
    for symbol in config.symbols() {
        gateway.add_market(MarketStatus::new(symbol.clone()).with_precision(2, 8));
        gateway.set_ticker(Ticker::new(symbol.clone(), start, now_millis()));
    }
    for (asset, amount) in &config.simulator().starting_portfolio {
        gateway.set_balance(asset, *amount);
    }
    RetryingGateway::new(gateway, config.retry())
}

/// Triggers every scheduler of `time_frame` at each of its candle closes.
fn spawn_time_frame_clock(
    time_frame: TimeFrame,
    triggers: Vec<SchedulerTrigger>,
    stop: StopSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(time_frame.duration());
        loop {
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                _ = interval.tick() => {
                    for trigger in &triggers {
                        trigger.trigger();
                    }
                }
            }
        }
    })
}

fn log_events(events: &EventBus, stop: StopSignal) -> JoinHandle<()> {
    let mut listener = events.subscribe();
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                biased;
                _ = stop.stopped() => break,
                event = listener.recv() => event,
            };
            match event {
                Ok(BotEvent::Error { component, message }) => error!("{}: {}", component, message),
                Ok(BotEvent::PortfolioRefreshed { exchange, assets }) => {
                    info!("{}: portfolio {:?}", exchange, assets)
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event log lagging, {} events skipped", skipped)
                }
                Err(_) => break,
            }
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    // 1. Arguments and configuration
    let args = BotArgs::parse_args(std::env::args().collect());
    let mut config = BotConfig::load(&args.get_config())
        .with_context(|| format!("Failed to load {}", args.get_config().display()))?;
    if args.simulate() {
        config = config.with_simulated(true);
    }
    if !config.is_simulated() {
        bail!("Only the simulated exchange is available; enable the simulator or pass --simulate");
    }
    let registry = EvaluatorRegistry::with_builtins();
    registry
        .check(config.evaluators(), config.strategy())
        .context("Invalid evaluator setup")?;

    // 2. Exchange, previous state and engine
    let exchanges = config.exchange_names();
    let Some(exchange) = exchanges.first().cloned() else {
        bail!("No exchange configured");
    };
    let gateway = Arc::new(create_simulated_exchange(&config, &exchange));
    let state = PreviousStateManager::new(
        config.state_file(&args.get_data_dir()),
        &exchanges,
        config.symbols(),
        config.reference_market(),
        args.reset_state(),
    );
    let events = EventBus::new();
    let engine = Engine::new(config.clone(), gateway.clone(), state, registry, events.clone())
        .await
        .context("Failed to start the engine")?;

    // 3. Market data dispatch and schedulers
    let mut dispatcher = MarketDispatcher::new(&exchange);
    let mut schedulers: Vec<TaskScheduler> = Vec::new();
    let mut ticker_consumers: Vec<Consumer<MarketEvent>> = Vec::new();
    for symbol in config.symbols() {
        let created = engine
            .create_schedulers(symbol, Some(dispatcher.cache()))
            .with_context(|| format!("Failed to create the schedulers of {}", symbol))?;
        if let Some(real_time) = created.first() {
            let handler = Arc::new(TickerTrigger {
                trigger: real_time.trigger_handle(),
            });
            let consumer = Consumer::new(format!("{}:{}:trigger", exchange, symbol), handler);
            dispatcher.subscribe(Topic::Ticker, symbol.clone(), consumer.queue());
            ticker_consumers.push(consumer);
        }
        schedulers.extend(created);
    }

    let stop = StopSignal::new();
    let mut handles = vec![log_events(&events, stop.clone())];
    for time_frame in config.time_frames() {
        let triggers = schedulers
            .iter()
            .filter(|s| s.key().time_frame() == *time_frame)
            .map(TaskScheduler::trigger_handle)
            .collect();
        handles.push(spawn_time_frame_clock(*time_frame, triggers, stop.clone()));
    }
    for scheduler in schedulers.iter_mut() {
        scheduler.start();
    }
    for consumer in ticker_consumers.iter_mut() {
        handles.push(consumer.start()?);
    }
    dispatcher.start()?;
    info!(
        "{}: trading {} symbols on {} time frames",
        exchange,
        config.symbols().len(),
        config.time_frames().len()
    );

    // 4. Feed and order refresh until interrupted
    let mut feed = RandomFeed::new(config.symbols(), FEED_START_PRICE);
    let mut feed_tick = tokio::time::interval(FEED_INTERVAL);
    let mut orders_tick = tokio::time::interval(ORDER_REFRESH_INTERVAL);
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for ctrl-c")?;
                info!("Shutting down");
                break;
            }
            _ = feed_tick.tick() => feed.tick(gateway.inner(), &dispatcher),
            _ = orders_tick.tick() => {
                let closed = engine.trader().update_open_orders().await;
                if closed > 0 {
                    info!("{}: {} orders closed", exchange, closed);
                }
            }
        }
    }

    // 5. Drain: sources first, then the cycles in flight
    stop.stop();
    dispatcher.stop();
    for consumer in &ticker_consumers {
        consumer.stop();
    }
    for scheduler in schedulers {
        scheduler.shutdown().await;
    }
    dispatcher.join().await;
    for result in join_all(handles).await {
        if let Err(e) = result {
            error!("Background task ended abnormally: {}", e);
        }
    }

    engine.flush_state().await;
    let totals = engine.trader().portfolio().lock().await.totals();
    let value = engine.portfolio_value(&totals).await;
    info!(
        "{}: final portfolio worth {} {}",
        exchange,
        value,
        config.reference_market()
    );
    Ok(())
}
