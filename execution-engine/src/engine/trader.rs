use crate::models::{BalanceView, Portfolio, Reservation, SharedPortfolio};
use crate::orders::{
    fetch_last_prices, OrderStatusPoller, OrderTimeouts, OrdersManager, StatusWait,
};
use crate::trades::TradesManager;
use log::{debug, info, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use trading::{
    now_millis, ExecutionReport, Fee, Gateway, Order, OrderStatus, Side, Symbol, Trade,
    TradingError, TradingResult,
};
use trading_core::framework::{BotEvent, EventBus};
use trading_core::fs::previous_state::{PreviousStateManager, StateUpdate};
use uuid::Uuid;

/// Fee rate applied to simulated fills unless configured otherwise.
const DEFAULT_SIMULATED_FEE_RATE: Decimal = Decimal::from_parts(1, 0, 0, false, 3);

pub type SharedStateManager = Arc<std::sync::Mutex<PreviousStateManager>>;

/// Result of submitting a batch of planned orders.
///
/// `failed` keeps the index of each order in the submitted batch.
#[derive(Debug, Clone, Default)]
pub struct PlacementOutcome {
    pub placed: Vec<Order>,
    pub failed: Vec<(usize, TradingError)>,
}

impl PlacementOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Indices that failed for lack of balance.
    pub fn insufficient_balance_indices(&self) -> Vec<usize> {
        self.failed
            .iter()
            .filter(|(_, e)| matches!(e, TradingError::InsufficientBalance { .. }))
            .map(|(index, _)| *index)
            .collect()
    }
}

/// Places, tracks, fills and cancels the orders of one exchange.
///
/// In simulation the gateway is only read for market data: orders are
/// reserved, filled and settled locally. Otherwise the portfolio is only
/// mutated once the exchange acknowledged the order.
///
/// Locks are always taken placement first, then orders, then portfolio.
/// The placement lock serializes the check, submission and reservation of
/// every order and edit.
pub struct Trader {
    exchange: String,
    gateway: Arc<dyn Gateway>,
    portfolio: SharedPortfolio,
    placement: Mutex<()>,
    orders: Mutex<OrdersManager>,
    trades: Mutex<TradesManager>,
    poller: OrderStatusPoller,
    events: EventBus,
    state: Option<SharedStateManager>,
    simulated: bool,
    fee_rate: Decimal,
}

impl Trader {
    pub fn new(gateway: Arc<dyn Gateway>, portfolio: SharedPortfolio, events: EventBus) -> Self {
        Self {
            exchange: gateway.name().to_string(),
            simulated: gateway.is_simulated(),
            gateway,
            portfolio,
            placement: Mutex::new(()),
            orders: Mutex::new(OrdersManager::new()),
            trades: Mutex::new(TradesManager::new()),
            poller: OrderStatusPoller::default(),
            events,
            state: None,
            fee_rate: DEFAULT_SIMULATED_FEE_RATE,
        }
    }

    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    pub fn with_timeouts(mut self, timeouts: OrderTimeouts) -> Self {
        self.poller = OrderStatusPoller::new(timeouts);
        self
    }

    pub fn with_state(mut self, state: SharedStateManager) -> Self {
        self.state = Some(state);
        self
    }

    pub fn with_trades(mut self, trades: TradesManager) -> Self {
        self.trades = Mutex::new(trades);
        self
    }

    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn is_simulated(&self) -> bool {
        self.simulated
    }

    pub fn gateway(&self) -> &Arc<dyn Gateway> {
        &self.gateway
    }

    pub fn portfolio(&self) -> SharedPortfolio {
        self.portfolio.clone()
    }

    pub async fn open_orders(&self) -> Vec<Order> {
        self.orders.lock().await.get_open_orders().to_vec()
    }

    pub async fn open_orders_for(&self, symbol: &Symbol) -> Vec<Order> {
        let orders = self.orders.lock().await;
        orders
            .get_orders_with_symbol(symbol)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn trade_history(&self, symbol: Option<&Symbol>) -> Vec<Trade> {
        let trades = self.trades.lock().await;
        trades
            .select_trade_history(symbol)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn total_paid_fees(&self) -> HashMap<String, Decimal> {
        self.trades.lock().await.get_total_paid_fees()
    }

    /// Places `order` and returns it as last known.
    ///
    /// A market order is only returned once filled. On a real exchange a
    /// market fill that does not come within budget yields `Timeout` and the
    /// order stays tracked as open.
    pub async fn create_order(&self, order: Order) -> TradingResult<Order> {
        let order = order.with_simulated(self.simulated);
        if self.simulated {
            self.create_simulated_order(order).await
        } else {
            self.create_real_order(order).await
        }
    }

    async fn create_simulated_order(&self, mut order: Order) -> TradingResult<Order> {
        {
            let mut orders = self.orders.lock().await;
            let mut portfolio = self.portfolio.lock().await;
            portfolio.reserve(&order)?;
            if !order.kind().is_market() {
                orders.add_order(order.clone());
            }
        }
        info!("{}: created {}", self.exchange, order);
        self.events.publish(BotEvent::OrderCreated {
            exchange: self.exchange.clone(),
            order: order.clone(),
        });

        if order.kind().is_market() {
            let price = order.origin_price();
            let quantity = order.origin_quantity();
            let fee = self.simulated_fee(&order, quantity, price);
            order.mark_filled(price, quantity, Some(fee), now_millis());
            self.on_filled(order.clone()).await;
        }
        Ok(order)
    }

    async fn create_real_order(&self, mut order: Order) -> TradingResult<Order> {
        {
            let _placement = self.placement.lock().await;
            ensure_available(&*self.portfolio.lock().await, &order, None)?;

            let report = self.gateway.create_order(&order).await?;
            order.apply_report(&report);
            let mut orders = self.orders.lock().await;
            let mut portfolio = self.portfolio.lock().await;
            if let Err(e) = portfolio.reserve(&order) {
                drop(portfolio);
                drop(orders);
                warn!("{}: {} acknowledged without balance, canceling", self.exchange, order);
                if let Err(cancel) = self.cancel_on_exchange(&order).await {
                    warn!("{}: failed to cancel {}: {}", self.exchange, order, cancel);
                }
                return Err(e);
            }
            orders.add_order(order.clone());
        }
        info!(
            "{}: created {} ({})",
            self.exchange,
            order,
            order.exchange_id().unwrap_or("-")
        );
        self.events.publish(BotEvent::OrderCreated {
            exchange: self.exchange.clone(),
            order: order.clone(),
        });

        if order.status().is_filled() {
            self.on_filled(order.clone()).await;
            return Ok(order);
        }
        if order.kind().is_market() {
            let report = self.wait_for_status(&order, StatusWait::MarketFill).await?;
            order.apply_report(&report);
            self.on_filled(order.clone()).await;
        }
        Ok(order)
    }

    /// Submits a planned batch in order.
    ///
    /// A contingent order whose primary failed is skipped and reported with
    /// the primary's error. Orders placed before a failure stay open.
    pub async fn create_orders(&self, orders: Vec<Order>) -> PlacementOutcome {
        let mut outcome = PlacementOutcome::default();
        let mut failed_primary: Option<(Uuid, TradingError)> = None;

        for (index, order) in orders.into_iter().enumerate() {
            let contingent = order.kind().is_contingent();
            if contingent {
                if let Some((primary, error)) = &failed_primary {
                    if order.linked_orders().contains(primary) {
                        debug!("Skipping {}: its primary order failed", order);
                        outcome.failed.push((index, error.clone()));
                        continue;
                    }
                }
            } else {
                failed_primary = None;
            }

            let id = order.id();
            match self.create_order(order).await {
                Ok(placed) => outcome.placed.push(placed),
                Err(e) => {
                    warn!("{}: order {} failed: {}", self.exchange, index, e);
                    if !contingent {
                        failed_primary = Some((id, e.clone()));
                    }
                    outcome.failed.push((index, e));
                }
            }
        }
        outcome
    }

    /// Cancels an open order together with the orders linked to it.
    ///
    /// Returns false when the order is not tracked anymore.
    pub async fn cancel_order(&self, order_id: &Uuid) -> TradingResult<bool> {
        let mut pending = vec![*order_id];
        let mut canceled = false;

        while let Some(id) = pending.pop() {
            let Some(order) = self.orders.lock().await.remove_order(&id) else {
                continue;
            };
            if let Err(e) = self.cancel_on_exchange(&order).await {
                self.orders.lock().await.add_order(order);
                if id == *order_id {
                    return Err(e);
                }
                warn!("{}: failed to cancel linked order {}: {}", self.exchange, id, e);
                continue;
            }
            pending.extend(order.linked_orders().iter().copied());
            self.finish_cancel(order).await;
            canceled |= id == *order_id;
        }
        Ok(canceled)
    }

    async fn cancel_on_exchange(&self, order: &Order) -> TradingResult<()> {
        if self.simulated {
            return Ok(());
        }
        let Some(exchange_id) = order.exchange_id() else {
            return Ok(());
        };
        self.gateway.cancel_order(exchange_id, order.symbol()).await?;
        self.wait_for_status(order, StatusWait::CancelConfirmation)
            .await
            .map(|_| ())
    }

    async fn finish_cancel(&self, mut order: Order) {
        self.portfolio.lock().await.release(&order);
        order.mark_canceled(now_millis());
        info!("{}: canceled {}", self.exchange, order);
        self.record_trade(&order).await;
        self.events.publish(BotEvent::OrderCanceled {
            exchange: self.exchange.clone(),
            order,
        });
    }

    /// Cancels every open order of `symbol`, carrying on past failures.
    pub async fn cancel_open_orders(&self, symbol: &Symbol) -> usize {
        let ids: Vec<Uuid> = {
            let orders = self.orders.lock().await;
            orders
                .get_orders_with_symbol(symbol)
                .iter()
                .map(|o| o.id())
                .collect()
        };
        let mut canceled = 0;
        for id in ids {
            match self.cancel_order(&id).await {
                Ok(true) => canceled += 1,
                Ok(false) => {}
                Err(e) => warn!("{}: failed to cancel order {}: {}", self.exchange, id, e),
            }
        }
        canceled
    }

    /// Settles a filled order and retires its linked orders.
    pub async fn on_filled(&self, order: Order) {
        let totals = {
            let mut orders = self.orders.lock().await;
            let mut portfolio = self.portfolio.lock().await;
            orders.remove_order(&order.id());
            portfolio.settle(&order);
            portfolio.totals()
        };
        info!(
            "{}: filled {} at {}",
            self.exchange,
            order,
            order.filled_price()
        );
        self.record_trade(&order).await;
        if self.simulated {
            self.persist(StateUpdate::SimulatedPortfolio(totals));
        }
        self.events.publish(BotEvent::OrderFilled {
            exchange: self.exchange.clone(),
            order: order.clone(),
        });

        for linked in order.linked_orders() {
            if let Err(e) = self.cancel_order(linked).await {
                warn!("{}: failed to cancel linked order {}: {}", self.exchange, linked, e);
            }
        }
    }

    /// Brings the tracked orders up to date and settles the filled ones.
    ///
    /// Returns how many orders left the open list.
    pub async fn update_open_orders(&self) -> usize {
        if self.simulated {
            self.update_simulated_orders().await
        } else {
            self.update_real_orders().await
        }
    }

    async fn update_simulated_orders(&self) -> usize {
        let symbols = self.orders.lock().await.watched_symbols();
        let prices = fetch_last_prices(self.gateway.as_ref(), symbols).await;
        let fills = {
            let mut orders = self.orders.lock().await;
            for (symbol, trades) in prices {
                orders.set_last_prices(symbol, trades);
            }
            orders.check_simulated_fills()
        };

        let mut settled = 0;
        for fill in fills {
            // A previous fill may have canceled this one as a linked order.
            let Some(mut order) = self.orders.lock().await.get_order(&fill.order_id).cloned() else {
                continue;
            };
            let quantity = order.origin_quantity();
            let fee = self.simulated_fee(&order, quantity, fill.price);
            order.mark_filled(fill.price, quantity, Some(fee), now_millis());
            self.on_filled(order).await;
            settled += 1;
        }
        settled
    }

    async fn update_real_orders(&self) -> usize {
        let open = self.open_orders().await;
        let mut closed = 0;
        for mut order in open {
            let Some(exchange_id) = order.exchange_id().map(str::to_string) else {
                continue;
            };
            let report = match self.gateway.get_order(&exchange_id, order.symbol()).await {
                Ok(report) => report,
                Err(e) => {
                    warn!("{}: failed to refresh order {}: {}", self.exchange, order.id(), e);
                    continue;
                }
            };
            order.apply_report(&report);
            match order.status() {
                status if status.is_filled() => {
                    self.on_filled(order).await;
                    closed += 1;
                }
                OrderStatus::Canceled => {
                    let removed = self.orders.lock().await.remove_order(&order.id());
                    if removed.is_some() {
                        info!("{}: {} canceled by the exchange", self.exchange, order.id());
                        self.finish_cancel(order).await;
                        closed += 1;
                    }
                }
                _ => self.orders.lock().await.update_order(order),
            }
        }
        closed
    }

    /// Changes quantity and price of an open order, moving its reservation.
    ///
    /// An edit the balance cannot cover is rejected before reaching the
    /// exchange and leaves the order and its reservation untouched.
    pub async fn edit_order(
        &self,
        order_id: &Uuid,
        quantity: Decimal,
        price: Decimal,
    ) -> TradingResult<Order> {
        let _placement = self.placement.lock().await;
        let Some(current) = self.orders.lock().await.get_order(order_id).cloned() else {
            return Err(TradingError::UnknownOrder(order_id.to_string()));
        };
        let mut edited = current.clone();
        edited.edit(quantity, price);
        ensure_available(&*self.portfolio.lock().await, &edited, Some(&current))?;

        if !self.simulated {
            if let Some(exchange_id) = current.exchange_id() {
                let report = self
                    .gateway
                    .edit_order(exchange_id, current.symbol(), quantity, price)
                    .await?;
                edited.apply_report(&report);
                self.wait_for_status(&edited, StatusWait::EditConfirmation)
                    .await?;
            }
        }

        let mut orders = self.orders.lock().await;
        let mut portfolio = self.portfolio.lock().await;
        portfolio.release(&current);
        if let Err(e) = portfolio.reserve(&edited) {
            if let Err(restore) = portfolio.reserve(&current) {
                warn!("{}: lost the reservation of {}: {}", self.exchange, current, restore);
            }
            return Err(e);
        }
        orders.update_order(edited.clone());
        info!("{}: edited {}", self.exchange, edited);
        Ok(edited)
    }

    /// Polls the exchange until `order` reaches what `wait` expects.
    pub async fn wait_for_status(
        &self,
        order: &Order,
        wait: StatusWait,
    ) -> TradingResult<ExecutionReport> {
        self.poller.wait_for(self.gateway.as_ref(), order, wait).await
    }

    /// Replaces the portfolio with the exchange balances and re-reserves the
    /// open orders. The simulated portfolio is its own source of truth.
    pub async fn force_refresh_portfolio(&self) -> TradingResult<()> {
        if self.simulated {
            debug!("{}: simulated portfolio, nothing to refresh", self.exchange);
            return Ok(());
        }
        let balances = self.gateway.get_balance().await?;
        let assets = {
            let orders = self.orders.lock().await;
            let mut portfolio = self.portfolio.lock().await;
            portfolio.resync(&balances, orders.get_open_orders());
            let mut assets: Vec<(String, Decimal)> = portfolio.totals().into_iter().collect();
            assets.sort();
            assets
        };
        info!("{}: portfolio refreshed from the exchange", self.exchange);
        self.events.publish(BotEvent::PortfolioRefreshed {
            exchange: self.exchange.clone(),
            assets,
        });
        Ok(())
    }

    fn simulated_fee(&self, order: &Order, quantity: Decimal, price: Decimal) -> Fee {
        let (base, quote) = order.currency_and_market();
        match order.side() {
            Side::Buy => Fee::new(base, quantity * self.fee_rate),
            Side::Sell => Fee::new(quote, quantity * price * self.fee_rate),
        }
    }

    async fn record_trade(&self, order: &Order) {
        let trade = Trade::from_order(self.exchange.clone(), order);
        let added = self
            .trades
            .lock()
            .await
            .add_new_trade_in_history(trade.clone());
        if added {
            self.persist(StateUpdate::Trade(trade));
        }
    }

    fn persist(&self, update: StateUpdate) {
        if let Some(state) = &self.state {
            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            state.update(&self.exchange, update);
        }
    }
}

/// Fails with `InsufficientBalance` when `portfolio` cannot hold `order`,
/// counting the amount `replacing` would give back.
fn ensure_available(
    portfolio: &Portfolio,
    order: &Order,
    replacing: Option<&Order>,
) -> TradingResult<()> {
    let Some(needed) = Reservation::for_order(order) else {
        return Ok(());
    };
    let freed = replacing
        .and_then(|current| portfolio.reservation(&current.id()))
        .filter(|held| held.asset == needed.asset)
        .map(|held| held.amount)
        .unwrap_or_default();
    let available = portfolio.available(&needed.asset) + freed;
    if available < needed.amount {
        return Err(TradingError::InsufficientBalance {
            asset: needed.asset,
            required: needed.amount,
            available,
        });
    }
    Ok(())
}
