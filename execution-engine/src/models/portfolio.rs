use log::{debug, warn};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use trading::{Order, PortfolioEntry, Side, TradingError, TradingResult};
use uuid::Uuid;

/// Read access to per-asset balances, as needed by the order planner.
pub trait BalanceView {
    fn available(&self, asset: &str) -> Decimal;

    fn total(&self, asset: &str) -> Decimal;
}

/// Portfolio shared by the trader, the decider and sub-portfolios.
pub type SharedPortfolio = Arc<Mutex<Portfolio>>;

/// An amount of one asset held back for an open order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub asset: String,
    pub amount: Decimal,
}

impl Reservation {
    /// What `order` holds back while open: quote for a buy, base for a sell.
    ///
    /// Contingent orders share the reservation of the order they protect.
    pub fn for_order(order: &Order) -> Option<Self> {
        if order.kind().is_contingent() {
            return None;
        }
        let (base, quote) = order.currency_and_market();
        let reservation = match order.side() {
            Side::Buy => Self {
                asset: quote.to_string(),
                amount: order.origin_quantity() * order.origin_price(),
            },
            Side::Sell => Self {
                asset: base.to_string(),
                amount: order.origin_quantity(),
            },
        };
        Some(reservation)
    }
}

/// Balances of one exchange account with an order-keyed reservation table.
///
/// For every asset, `total - available` equals the sum of the reservations
/// held in that asset.
#[derive(Debug, Clone, Default)]
pub struct Portfolio {
    entries: HashMap<String, PortfolioEntry>,
    reservations: HashMap<Uuid, Reservation>,
}

impl Portfolio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Portfolio holding `totals`, nothing reserved.
    pub fn from_totals(totals: &HashMap<String, Decimal>) -> Self {
        let entries = totals
            .iter()
            .map(|(asset, amount)| (asset.clone(), PortfolioEntry::free(*amount)))
            .collect();
        Self {
            entries,
            reservations: HashMap::new(),
        }
    }

    /// Portfolio whose entries already hold amounts outside this reservation
    /// table, such as a share of a parent portfolio's reservations.
    pub fn from_entries(entries: HashMap<String, PortfolioEntry>) -> Self {
        Self {
            entries,
            reservations: HashMap::new(),
        }
    }

    /// Entry of `asset`, zero when never held.
    pub fn get_currency_portfolio(&self, asset: &str) -> PortfolioEntry {
        self.entries.get(asset).copied().unwrap_or_default()
    }

    pub fn entries(&self) -> &HashMap<String, PortfolioEntry> {
        &self.entries
    }

    /// Asset totals, the shape saved in the previous trading state.
    pub fn totals(&self) -> HashMap<String, Decimal> {
        self.entries
            .iter()
            .map(|(asset, entry)| (asset.clone(), entry.total))
            .collect()
    }

    pub fn reserved(&self, asset: &str) -> Decimal {
        self.reservations
            .values()
            .filter(|r| r.asset == asset)
            .map(|r| r.amount)
            .sum()
    }

    pub fn is_reserved(&self, order_id: &Uuid) -> bool {
        self.reservations.contains_key(order_id)
    }

    pub fn reservation(&self, order_id: &Uuid) -> Option<&Reservation> {
        self.reservations.get(order_id)
    }

    pub fn reservation_count(&self) -> usize {
        self.reservations.len()
    }

    pub fn deposit(&mut self, asset: &str, amount: Decimal) {
        let entry = self.entries.entry(asset.to_string()).or_default();
        entry.total += amount;
        entry.available += amount;
    }

    /// Removes `amount` of unreserved `asset`.
    pub fn withdraw(&mut self, asset: &str, amount: Decimal) -> TradingResult<()> {
        let available = self.available(asset);
        if available < amount {
            return Err(TradingError::InsufficientBalance {
                asset: asset.to_string(),
                required: amount,
                available,
            });
        }
        let entry = self.entries.entry(asset.to_string()).or_default();
        entry.total -= amount;
        entry.available -= amount;
        Ok(())
    }

    /// Holds back what `order` needs while it is open.
    ///
    /// Fails with `InsufficientBalance` and leaves the portfolio untouched
    /// when the asset is not available. Reserving an order twice is a no-op.
    pub fn reserve(&mut self, order: &Order) -> TradingResult<()> {
        let Some(reservation) = Reservation::for_order(order) else {
            return Ok(());
        };
        if self.reservations.contains_key(&order.id()) {
            return Ok(());
        }

        let available = self.available(&reservation.asset);
        if available < reservation.amount {
            return Err(TradingError::InsufficientBalance {
                asset: reservation.asset,
                required: reservation.amount,
                available,
            });
        }

        let entry = self.entries.entry(reservation.asset.clone()).or_default();
        entry.available -= reservation.amount;
        debug!(
            "Reserved {} {} for order {}",
            reservation.amount,
            reservation.asset,
            order.id()
        );
        self.reservations.insert(order.id(), reservation);
        Ok(())
    }

    /// Gives back the reservation of `order`. Returns whether one existed.
    pub fn release(&mut self, order: &Order) -> bool {
        self.release_id(&order.id())
    }

    pub fn release_id(&mut self, order_id: &Uuid) -> bool {
        let Some(reservation) = self.reservations.remove(order_id) else {
            return false;
        };
        let entry = self.entries.entry(reservation.asset).or_default();
        entry.available += reservation.amount;
        true
    }

    /// Applies a filled order: its reservation is released, then the fill
    /// and its fee move both totals and availability.
    pub fn settle(&mut self, order: &Order) {
        self.release(order);

        let (base, quote) = order.currency_and_market();
        let quantity = order.filled_quantity();
        let cost = quantity * order.filled_price();
        let (base_fee, quote_fee) = match order.fee() {
            Some(fee) if fee.currency == base => (fee.amount, Decimal::ZERO),
            Some(fee) if fee.currency == quote => (Decimal::ZERO, fee.amount),
            Some(fee) => {
                warn!(
                    "Ignoring fee in {} on order {} ({})",
                    fee.currency,
                    order.id(),
                    order.symbol()
                );
                (Decimal::ZERO, Decimal::ZERO)
            }
            None => (Decimal::ZERO, Decimal::ZERO),
        };

        let (base_delta, quote_delta) = match order.side() {
            Side::Buy => (quantity - base_fee, -cost - quote_fee),
            Side::Sell => (-quantity - base_fee, cost - quote_fee),
        };
        self.apply_delta(base, base_delta);
        self.apply_delta(quote, quote_delta);
    }

    fn apply_delta(&mut self, asset: &str, delta: Decimal) {
        let entry = self.entries.entry(asset.to_string()).or_default();
        entry.total += delta;
        entry.available += delta;
        if entry.total.is_sign_negative() && !entry.total.is_zero() {
            warn!("{} balance went negative: {}", asset, entry.total);
        }
    }

    /// Replaces the totals with what the exchange reports and rebuilds the
    /// reservations from the orders still open.
    pub fn resync(&mut self, balances: &HashMap<String, PortfolioEntry>, open_orders: &[Order]) {
        self.reservations = open_orders
            .iter()
            .filter(|order| order.is_open())
            .filter_map(|order| Reservation::for_order(order).map(|r| (order.id(), r)))
            .collect();

        self.entries = balances
            .iter()
            .map(|(asset, entry)| (asset.clone(), PortfolioEntry::free(entry.total)))
            .collect();

        let mut reserved: HashMap<String, Decimal> = HashMap::new();
        for reservation in self.reservations.values() {
            *reserved.entry(reservation.asset.clone()).or_default() += reservation.amount;
        }
        for (asset, amount) in reserved {
            let entry = self.entries.entry(asset.clone()).or_default();
            entry.available -= amount;
            if entry.available.is_sign_negative() && !entry.available.is_zero() {
                warn!(
                    "Open orders reserve more {} than the exchange reports ({} > {})",
                    asset, amount, entry.total
                );
            }
        }
    }
}

impl BalanceView for Portfolio {
    fn available(&self, asset: &str) -> Decimal {
        self.get_currency_portfolio(asset).available
    }

    fn total(&self, asset: &str) -> Decimal {
        self.get_currency_portfolio(asset).total
    }
}
