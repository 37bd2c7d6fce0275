use crate::orders::policy_for;
use async_trait::async_trait;
use log::{debug, info};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use trading::{
    now_millis, ExecutionReport, Fee, Gateway, MarketStatus, Order, OrderStatus, PortfolioEntry,
    RecentTrade, Side, Symbol, Ticker, TradingError, TradingResult,
};
use trading_core::config::SIMULATED_EXCHANGE;

/// Recent trades kept per symbol.
const TRADE_TAPE_LENGTH: usize = 100;

#[derive(Debug, Clone)]
struct SimulatedOrder {
    order: Order,
    hold: Option<(String, Decimal)>,
}

#[derive(Debug, Default)]
struct Book {
    markets: HashMap<Symbol, MarketStatus>,
    tickers: HashMap<Symbol, Ticker>,
    trades: HashMap<Symbol, Vec<RecentTrade>>,
    balances: HashMap<String, PortfolioEntry>,
    orders: HashMap<String, SimulatedOrder>,
    failures: VecDeque<TradingError>,
}

/// An in-memory exchange.
///
/// Orders rest until the recorded trades cross them; market orders fill on
/// creation unless disabled. Failures queued with `fail_next` are returned
/// by the next calls, in order. A latency set with `set_latency` delays
/// every call before it touches the book.
pub struct SimulatedGateway {
    name: String,
    fee_rate: Decimal,
    simulated: bool,
    instant_market_fills: bool,
    next_id: AtomicU64,
    calls: AtomicU64,
    latency_ms: AtomicU64,
    book: Mutex<Book>,
}

impl SimulatedGateway {
    pub fn new(fee_rate: Decimal) -> Self {
        Self {
            name: SIMULATED_EXCHANGE.to_string(),
            fee_rate,
            simulated: true,
            instant_market_fills: true,
            next_id: AtomicU64::new(1),
            calls: AtomicU64::new(0),
            latency_ms: AtomicU64::new(0),
            book: Mutex::new(Book::default()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Makes the gateway report itself as a real exchange.
    pub fn with_simulated(mut self, simulated: bool) -> Self {
        self.simulated = simulated;
        self
    }

    pub fn with_instant_market_fills(mut self, enabled: bool) -> Self {
        self.instant_market_fills = enabled;
        self
    }

    fn book(&self) -> MutexGuard<'_, Book> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn add_market(&self, market: MarketStatus) {
        self.book().markets.insert(market.symbol.clone(), market);
    }

    pub fn set_balance(&self, asset: &str, amount: Decimal) {
        self.book()
            .balances
            .insert(asset.to_string(), PortfolioEntry::free(amount));
    }

    pub fn set_ticker(&self, ticker: Ticker) {
        self.book().tickers.insert(ticker.symbol.clone(), ticker);
    }

    /// Records a trade on the tape and moves the ticker's last price.
    pub fn push_trade(&self, symbol: &Symbol, trade: RecentTrade) {
        let mut book = self.book();
        let tape = book.trades.entry(symbol.clone()).or_default();
        tape.push(trade);
        if tape.len() > TRADE_TAPE_LENGTH {
            let excess = tape.len() - TRADE_TAPE_LENGTH;
            tape.drain(..excess);
        }
        let ticker = book
            .tickers
            .entry(symbol.clone())
            .or_insert_with(|| Ticker::new(symbol.clone(), trade.price, trade.timestamp));
        ticker.last = trade.price;
        ticker.timestamp = trade.timestamp;
    }

    /// Queues an error returned by the next gateway call.
    pub fn fail_next(&self, error: TradingError) {
        self.book().failures.push_back(error);
    }

    pub fn set_latency(&self, latency: Duration) {
        let ms = u64::try_from(latency.as_millis()).unwrap_or(u64::MAX);
        self.latency_ms.store(ms, Ordering::Release);
    }

    /// Number of gateway calls answered, failed ones included.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Acquire)
    }

    async fn delay(&self) {
        let ms = self.latency_ms.load(Ordering::Acquire);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }

    fn enter(&self) -> TradingResult<MutexGuard<'_, Book>> {
        self.calls.fetch_add(1, Ordering::AcqRel);
        let mut book = self.book();
        match book.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(book),
        }
    }

    fn fee_for(&self, order: &Order, quantity: Decimal, price: Decimal) -> Fee {
        let (base, quote) = order.currency_and_market();
        match order.side() {
            Side::Buy => Fee::new(base, quantity * self.fee_rate),
            Side::Sell => Fee::new(quote, quantity * price * self.fee_rate),
        }
    }
}

impl Book {
    fn market(&self, symbol: &Symbol) -> TradingResult<&MarketStatus> {
        self.markets
            .get(symbol)
            .ok_or_else(|| TradingError::UnknownMarket(symbol.to_string()))
    }

    fn last_price(&self, symbol: &Symbol) -> Option<Decimal> {
        self.tickers.get(symbol).map(|t| t.last)
    }

    fn hold(&mut self, order: &Order) -> TradingResult<Option<(String, Decimal)>> {
        if order.kind().is_contingent() {
            return Ok(None);
        }
        let (base, quote) = order.currency_and_market();
        let (asset, amount) = match order.side() {
            Side::Buy => (quote, order.origin_cost()),
            Side::Sell => (base, order.origin_quantity()),
        };
        let entry = self.balances.entry(asset.to_string()).or_default();
        if entry.available < amount {
            return Err(TradingError::InsufficientBalance {
                asset: asset.to_string(),
                required: amount,
                available: entry.available,
            });
        }
        entry.available -= amount;
        Ok(Some((asset.to_string(), amount)))
    }

    fn release(&mut self, hold: Option<(String, Decimal)>) {
        if let Some((asset, amount)) = hold {
            self.balances.entry(asset).or_default().available += amount;
        }
    }

    fn settle(&mut self, order: &Order) {
        let (base, quote) = order.currency_and_market();
        let quantity = order.filled_quantity();
        let cost = quantity * order.filled_price();
        let fee = order.fee().map(|f| f.amount).unwrap_or_default();
        let (base_delta, quote_delta) = match order.side() {
            Side::Buy => (quantity - fee, -cost),
            Side::Sell => (-quantity, cost - fee),
        };
        for (asset, delta) in [(base, base_delta), (quote, quote_delta)] {
            let entry = self.balances.entry(asset.to_string()).or_default();
            entry.total += delta;
            entry.available += delta;
        }
    }
}

fn report_of(order: &Order, timestamp: i64) -> ExecutionReport {
    let mut report = ExecutionReport::new(
        order.exchange_id().map(str::to_string),
        order.status(),
        timestamp,
    );
    if order.status().is_filled() {
        report = report.with_fill(order.filled_quantity(), order.filled_price());
        if let Some(fee) = order.fee() {
            report = report.with_fee(fee.clone());
        }
    }
    report
}

#[async_trait]
impl Gateway for SimulatedGateway {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_simulated(&self) -> bool {
        self.simulated
    }

    async fn get_balance(&self) -> TradingResult<HashMap<String, PortfolioEntry>> {
        self.delay().await;
        let book = self.enter()?;
        Ok(book.balances.clone())
    }

    async fn create_order(&self, order: &Order) -> TradingResult<ExecutionReport> {
        self.delay().await;
        let mut book = self.enter()?;
        book.market(order.symbol())?;
        let hold = book.hold(order)?;

        let exchange_id = format!("sim-{}", self.next_id.fetch_add(1, Ordering::AcqRel));
        let mut placed = order.clone();
        placed.set_exchange_id(exchange_id.clone());
        let now = now_millis();

        if order.kind().is_market() && self.instant_market_fills {
            let price = book
                .last_price(order.symbol())
                .unwrap_or_else(|| order.origin_price());
            let quantity = order.origin_quantity();
            let fee = self.fee_for(order, quantity, price);
            placed.mark_filled(price, quantity, Some(fee), now);
            book.release(hold);
            book.settle(&placed);
            info!("{}: filled {} at {}", self.name, placed, price);
            let report = report_of(&placed, now);
            book.orders
                .insert(exchange_id, SimulatedOrder { order: placed, hold: None });
            return Ok(report);
        }

        debug!("{}: resting {} as {}", self.name, placed, exchange_id);
        let report = report_of(&placed, now);
        book.orders
            .insert(exchange_id, SimulatedOrder { order: placed, hold });
        Ok(report)
    }

    async fn cancel_order(&self, exchange_id: &str, _symbol: &Symbol) -> TradingResult<()> {
        self.delay().await;
        let mut book = self.enter()?;
        let entry = book
            .orders
            .get_mut(exchange_id)
            .ok_or_else(|| TradingError::UnknownOrder(exchange_id.to_string()))?;
        if !entry.order.is_open() {
            return Ok(());
        }
        entry.order.mark_canceled(now_millis());
        let hold = entry.hold.take();
        book.release(hold);
        Ok(())
    }

    async fn get_order(&self, exchange_id: &str, symbol: &Symbol) -> TradingResult<ExecutionReport> {
        self.delay().await;
        let mut book = self.enter()?;
        let Some(entry) = book.orders.get(exchange_id).cloned() else {
            return Err(TradingError::UnknownOrder(exchange_id.to_string()));
        };
        let now = now_millis();
        if !entry.order.is_open() {
            return Ok(report_of(&entry.order, now));
        }

        let trades = book.trades.get(symbol).cloned().unwrap_or_default();
        let order = &entry.order;
        let fill = if order.kind().is_market() && !self.instant_market_fills {
            None
        } else {
            policy_for(order.kind(), order.side())(order, &trades)
        };
        let Some(price) = fill else {
            return Ok(report_of(order, now));
        };

        let mut filled = entry.order.clone();
        let quantity = filled.origin_quantity();
        let fee = self.fee_for(&filled, quantity, price);
        filled.mark_filled(price, quantity, Some(fee), now);
        book.release(entry.hold);
        book.settle(&filled);
        info!("{}: filled {} at {}", self.name, filled, price);

        let report = report_of(&filled, now);
        book.orders.insert(
            exchange_id.to_string(),
            SimulatedOrder {
                order: filled,
                hold: None,
            },
        );
        Ok(report)
    }

    async fn edit_order(
        &self,
        exchange_id: &str,
        _symbol: &Symbol,
        quantity: Decimal,
        price: Decimal,
    ) -> TradingResult<ExecutionReport> {
        self.delay().await;
        let mut book = self.enter()?;
        let Some(entry) = book.orders.get(exchange_id).cloned() else {
            return Err(TradingError::UnknownOrder(exchange_id.to_string()));
        };
        if !entry.order.is_open() {
            return Err(TradingError::UnknownOrder(format!(
                "{} is no longer open",
                exchange_id
            )));
        }

        book.release(entry.hold.clone());
        let mut edited = entry.order.clone();
        edited.edit(quantity, price);
        let hold = match book.hold(&edited) {
            Ok(hold) => hold,
            Err(e) => {
                // Restore the original reservation.
                let _ = book.hold(&entry.order);
                return Err(e);
            }
        };
        let report = report_of(&edited, now_millis());
        book.orders
            .insert(exchange_id.to_string(), SimulatedOrder { order: edited, hold });
        Ok(report)
    }

    async fn get_market_status(&self, symbol: &Symbol) -> TradingResult<MarketStatus> {
        self.delay().await;
        let book = self.enter()?;
        book.market(symbol).cloned()
    }

    async fn get_price_ticker(&self, symbol: &Symbol) -> TradingResult<Ticker> {
        self.delay().await;
        let book = self.enter()?;
        book.market(symbol)?;
        book.tickers
            .get(symbol)
            .cloned()
            .ok_or_else(|| TradingError::unavailable(format!("no ticker yet for {}", symbol)))
    }

    async fn get_recent_trades(&self, symbol: &Symbol) -> TradingResult<Vec<RecentTrade>> {
        self.delay().await;
        let book = self.enter()?;
        book.market(symbol)?;
        Ok(book.trades.get(symbol).cloned().unwrap_or_default())
    }
}
