//! Market data models.
//!
//! Includes `Ticker` for price ticks, `RecentTrade` for executed trades and
//! the `MarketEvent` envelope routed by the dispatcher.

use super::execution::ExecutionReport;
use super::symbol::Symbol;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Latest price snapshot of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    /// The last traded price.
    pub last: Decimal,
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
    /// Unix millis.
    pub timestamp: i64,
}

impl Ticker {
    pub fn new(symbol: Symbol, last: Decimal, timestamp: i64) -> Self {
        Self {
            symbol,
            last,
            bid: None,
            ask: None,
            timestamp,
        }
    }

    pub fn with_spread(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid = Some(bid);
        self.ask = Some(ask);
        self
    }
}

/// A trade printed on the exchange tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentTrade {
    pub price: Decimal,
    pub quantity: Decimal,
    pub timestamp: i64,
}

impl RecentTrade {
    pub fn new(price: Decimal, quantity: Decimal, timestamp: i64) -> Self {
        Self {
            price,
            quantity,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OrderBook {
    /// `(price, quantity)` levels, best first.
    pub bids: Vec<(Decimal, Decimal)>,
    pub asks: Vec<(Decimal, Decimal)>,
    pub timestamp: i64,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|(price, _)| *price)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|(price, _)| *price)
    }
}

/// Channel a market event travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Topic {
    Ticker,
    OrderBook,
    RecentTrades,
    OrderUpdate,
}

impl Topic {
    pub const ALL: [Topic; 4] = [
        Topic::Ticker,
        Topic::OrderBook,
        Topic::RecentTrades,
        Topic::OrderUpdate,
    ];
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topic::Ticker => "ticker",
            Topic::OrderBook => "order_book",
            Topic::RecentTrades => "recent_trades",
            Topic::OrderUpdate => "order_update",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MarketEvent {
    Ticker(Ticker),
    OrderBook {
        symbol: Symbol,
        book: OrderBook,
    },
    RecentTrades {
        symbol: Symbol,
        trades: Vec<RecentTrade>,
    },
    OrderUpdate {
        symbol: Symbol,
        report: ExecutionReport,
    },
}

impl MarketEvent {
    pub fn topic(&self) -> Topic {
        match self {
            MarketEvent::Ticker(_) => Topic::Ticker,
            MarketEvent::OrderBook { .. } => Topic::OrderBook,
            MarketEvent::RecentTrades { .. } => Topic::RecentTrades,
            MarketEvent::OrderUpdate { .. } => Topic::OrderUpdate,
        }
    }

    pub fn symbol(&self) -> &Symbol {
        match self {
            MarketEvent::Ticker(ticker) => &ticker.symbol,
            MarketEvent::OrderBook { symbol, .. }
            | MarketEvent::RecentTrades { symbol, .. }
            | MarketEvent::OrderUpdate { symbol, .. } => symbol,
        }
    }
}
