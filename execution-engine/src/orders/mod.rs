//! Open orders of one exchange and the market prints used to fill them in
//! simulation.

pub mod fill_policy;
pub mod poller;

pub use fill_policy::{policy_for, FillCheck};
pub use poller::{OrderStatusPoller, OrderTimeouts, StatusWait};

use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use trading::{Gateway, Order, RecentTrade, Symbol};
use uuid::Uuid;

/// A simulated order that met its fill condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedFill {
    pub order_id: Uuid,
    pub price: Decimal,
}

#[derive(Debug, Default)]
pub struct OrdersManager {
    orders: Vec<Order>,
    last_symbol_prices: HashMap<Symbol, Vec<RecentTrade>>,
}

impl OrdersManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracks `order` as open. Returns false if it was already tracked.
    pub fn add_order(&mut self, order: Order) -> bool {
        if self.has_order(&order.id()) {
            return false;
        }
        self.orders.push(order);
        true
    }

    pub fn remove_order(&mut self, order_id: &Uuid) -> Option<Order> {
        let index = self.orders.iter().position(|o| o.id() == *order_id)?;
        Some(self.orders.remove(index))
    }

    /// Replaces the tracked copy of `order`.
    pub fn update_order(&mut self, order: Order) {
        if let Some(slot) = self.orders.iter_mut().find(|o| o.id() == order.id()) {
            *slot = order;
        }
    }

    pub fn has_order(&self, order_id: &Uuid) -> bool {
        self.orders.iter().any(|o| o.id() == *order_id)
    }

    pub fn get_order(&self, order_id: &Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id() == *order_id)
    }

    pub fn get_open_orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get_orders_with_symbol(&self, symbol: &Symbol) -> Vec<&Order> {
        self.orders.iter().filter(|o| o.symbol() == symbol).collect()
    }

    pub fn last_symbol_prices(&self, symbol: &Symbol) -> &[RecentTrade] {
        self.last_symbol_prices
            .get(symbol)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn set_last_prices(&mut self, symbol: Symbol, trades: Vec<RecentTrade>) {
        self.last_symbol_prices.insert(symbol, trades);
    }

    /// Symbols with at least one open order.
    pub fn watched_symbols(&self) -> BTreeSet<Symbol> {
        self.orders.iter().map(|o| o.symbol().clone()).collect()
    }

    /// Refreshes the recent trades of every symbol with an open order.
    ///
    /// A symbol whose trades cannot be fetched keeps its previous prints.
    pub async fn update_last_prices(&mut self, gateway: &dyn Gateway) {
        for (symbol, trades) in fetch_last_prices(gateway, self.watched_symbols()).await {
            self.set_last_prices(symbol, trades);
        }
    }

    /// Open orders that the last prints would have filled, with their price.
    pub fn check_simulated_fills(&self) -> Vec<SimulatedFill> {
        self.orders
            .iter()
            .filter_map(|order| {
                let trades = self.last_symbol_prices(order.symbol());
                policy_for(order.kind(), order.side())(order, trades).map(|price| SimulatedFill {
                    order_id: order.id(),
                    price,
                })
            })
            .collect()
    }
}

/// Recent trades of `symbols`. Symbols whose trades cannot be fetched are
/// left out.
pub async fn fetch_last_prices(
    gateway: &dyn Gateway,
    symbols: BTreeSet<Symbol>,
) -> Vec<(Symbol, Vec<RecentTrade>)> {
    let mut fetched = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        match gateway.get_recent_trades(&symbol).await {
            Ok(trades) => {
                debug!("{}: {} recent trades", symbol, trades.len());
                fetched.push((symbol, trades));
            }
            Err(e) => warn!("Failed to refresh recent trades of {}: {}", symbol, e),
        }
    }
    fetched
}
