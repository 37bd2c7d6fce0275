use log::debug;
use rust_decimal::Decimal;
use std::collections::HashMap;
use trading::{Symbol, Trade};
use uuid::Uuid;

/// History of the orders that reached a terminal status on one exchange.
#[derive(Debug, Default)]
pub struct TradesManager {
    trades: Vec<Trade>,
}

impl TradesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the history from a saved one, keeping the first trade per order.
    pub fn from_history(history: impl IntoIterator<Item = Trade>) -> Self {
        let mut manager = Self::new();
        for trade in history {
            manager.add_new_trade_in_history(trade);
        }
        manager
    }

    /// Appends `trade` unless its order is already recorded.
    pub fn add_new_trade_in_history(&mut self, trade: Trade) -> bool {
        if self.is_in_history(&trade.order_id()) {
            debug!("Order {} already in trade history", trade.order_id());
            return false;
        }
        self.trades.push(trade);
        true
    }

    pub fn is_in_history(&self, order_id: &Uuid) -> bool {
        self.trades.iter().any(|t| t.order_id() == *order_id)
    }

    pub fn select_trade_history(&self, symbol: Option<&Symbol>) -> Vec<&Trade> {
        self.trades
            .iter()
            .filter(|t| symbol.map_or(true, |s| t.symbol() == s))
            .collect()
    }

    /// Fees paid so far, per fee currency.
    pub fn get_total_paid_fees(&self) -> HashMap<String, Decimal> {
        let mut fees: HashMap<String, Decimal> = HashMap::new();
        for fee in self.trades.iter().filter_map(|t| t.fee()) {
            *fees.entry(fee.currency.clone()).or_default() += fee.amount;
        }
        fees
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use trading::{Fee, Order, OrderKind, Side};

    fn filled(symbol: Symbol, side: Side, fee: Fee) -> Order {
        let mut order = Order::new(symbol, side, OrderKind::Limit, dec!(1), dec!(100));
        order.mark_filled(dec!(100), dec!(1), Some(fee), 10);
        order
    }

    #[test]
    fn test_history_is_deduplicated_by_order() {
        let order = filled(Symbol::new("BTC", "USDT"), Side::Buy, Fee::new("BTC", dec!(0.001)));
        let mut manager = TradesManager::new();
        assert!(manager.add_new_trade_in_history(Trade::from_order("simulated", &order)));
        assert!(!manager.add_new_trade_in_history(Trade::from_order("simulated", &order)));
        assert_eq!(manager.len(), 1);
        assert!(manager.is_in_history(&order.id()));
    }

    #[test]
    fn test_select_and_fees() {
        let btc = Symbol::new("BTC", "USDT");
        let eth = Symbol::new("ETH", "USDT");
        let manager = TradesManager::from_history([
            Trade::from_order("simulated", &filled(btc.clone(), Side::Buy, Fee::new("BTC", dec!(0.001)))),
            Trade::from_order("simulated", &filled(btc.clone(), Side::Sell, Fee::new("USDT", dec!(0.1)))),
            Trade::from_order("simulated", &filled(eth.clone(), Side::Sell, Fee::new("USDT", dec!(0.2)))),
        ]);

        assert_eq!(manager.select_trade_history(Some(&btc)).len(), 2);
        assert_eq!(manager.select_trade_history(Some(&eth)).len(), 1);
        assert_eq!(manager.select_trade_history(None).len(), 3);

        let fees = manager.get_total_paid_fees();
        assert_eq!(fees["BTC"], dec!(0.001));
        assert_eq!(fees["USDT"], dec!(0.3));
    }
}
