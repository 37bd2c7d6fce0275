use anyhow::Result;
use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;
use trading::{MarketEvent, RecentTrade, Symbol, Ticker, Topic};
use trading_core::comms::{Consumer, EventHandler, MarketDispatcher};

struct Collector {
    seen: Arc<Mutex<Vec<MarketEvent>>>,
    done: mpsc::UnboundedSender<()>,
}

#[async_trait]
impl EventHandler<MarketEvent> for Collector {
    async fn handle(&self, event: MarketEvent) -> Result<()> {
        self.seen.lock().unwrap().push(event);
        let _ = self.done.send(());
        Ok(())
    }
}

fn collector() -> (Consumer<MarketEvent>, Arc<Mutex<Vec<MarketEvent>>>, mpsc::UnboundedReceiver<()>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done, done_rx) = mpsc::unbounded_channel();
    let consumer = Consumer::new("collector", Arc::new(Collector { seen: seen.clone(), done }));
    (consumer, seen, done_rx)
}

fn ticker(symbol: &Symbol, last: rust_decimal::Decimal, ts: i64) -> MarketEvent {
    MarketEvent::Ticker(Ticker::new(symbol.clone(), last, ts))
}

async fn wait_for(done: &mut mpsc::UnboundedReceiver<()>, count: usize) {
    for _ in 0..count {
        timeout(Duration::from_secs(2), done.recv())
            .await
            .expect("event should be delivered")
            .expect("collector alive");
    }
}

#[tokio::test]
async fn test_ticker_events_keep_arrival_order() -> Result<()> {
    let _ = env_logger::builder().is_test(true).try_init();
    let btc = Symbol::new("BTC", "USDT");
    let mut dispatcher = MarketDispatcher::new("binance");
    let (mut consumer, seen, mut done) = collector();
    dispatcher.subscribe(Topic::Ticker, btc.clone(), consumer.queue());
    let collector_handle = consumer.start()?;
    dispatcher.start()?;

    for (i, price) in [dec!(100), dec!(101), dec!(99), dec!(102)].into_iter().enumerate() {
        dispatcher.publish(ticker(&btc, price, i as i64))?;
    }
    wait_for(&mut done, 4).await;

    let prices: Vec<_> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|e| match e {
            MarketEvent::Ticker(t) => t.last,
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(prices, vec![dec!(100), dec!(101), dec!(99), dec!(102)]);

    // The cache holds the latest value.
    assert_eq!(dispatcher.cache().ticker(&btc).unwrap().last, dec!(102));

    dispatcher.stop();
    dispatcher.join().await;
    consumer.stop();
    collector_handle.await?;
    Ok(())
}

#[tokio::test]
async fn test_fan_out_reaches_every_subscriber_of_the_symbol() -> Result<()> {
    let btc = Symbol::new("BTC", "USDT");
    let eth = Symbol::new("ETH", "USDT");
    let mut dispatcher = MarketDispatcher::new("binance");

    let (mut first, first_seen, mut first_done) = collector();
    let (mut second, second_seen, mut second_done) = collector();
    let (mut other, other_seen, _other_done) = collector();
    dispatcher.subscribe(Topic::RecentTrades, btc.clone(), first.queue());
    dispatcher.subscribe(Topic::RecentTrades, btc.clone(), second.queue());
    dispatcher.subscribe(Topic::RecentTrades, eth.clone(), other.queue());
    let handles = vec![first.start()?, second.start()?, other.start()?];
    dispatcher.start()?;

    dispatcher.publish(MarketEvent::RecentTrades {
        symbol: btc.clone(),
        trades: vec![RecentTrade::new(dec!(6943.01), dec!(0.5), 1)],
    })?;
    wait_for(&mut first_done, 1).await;
    wait_for(&mut second_done, 1).await;

    assert_eq!(first_seen.lock().unwrap().len(), 1);
    assert_eq!(second_seen.lock().unwrap().len(), 1);
    assert!(other_seen.lock().unwrap().is_empty());
    assert_eq!(dispatcher.cache().recent_trades(&btc).len(), 1);

    dispatcher.stop();
    dispatcher.join().await;
    for consumer in [&first, &second, &other] {
        consumer.stop();
    }
    for handle in handles {
        handle.await?;
    }
    Ok(())
}

#[tokio::test]
async fn test_events_after_stop_are_not_processed() -> Result<()> {
    let (mut consumer, seen, mut done) = collector();
    let queue = consumer.queue();
    let handle = consumer.start()?;
    let btc = Symbol::new("BTC", "USDT");

    queue.push(ticker(&btc, dec!(1), 1))?;
    wait_for(&mut done, 1).await;

    consumer.stop();
    handle.await?;
    // The loop is gone; the queue still accepts but nothing consumes.
    let _ = queue.push(ticker(&btc, dec!(2), 2));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(seen.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_dispatcher_cannot_start_twice() -> Result<()> {
    let mut dispatcher = MarketDispatcher::new("binance");
    dispatcher.start()?;
    assert!(dispatcher.start().is_err());
    dispatcher.stop();
    dispatcher.join().await;
    Ok(())
}
