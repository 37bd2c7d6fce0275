//! # Event Bus
//!
//! Decouples the trading pipeline from whoever wants to observe it (notifiers,
//! dashboards, tests). Components receive an `EventBus` handle at construction
//! instead of reaching for a process-wide bot instance.

use rust_decimal::Decimal;
use tokio::sync::broadcast;
use trading::{Order, Symbol, TradingState};

#[derive(Debug, Clone)]
pub enum BotEvent {
    /// **Decider**: the trading state of a symbol changed.
    StateChanged {
        exchange: String,
        symbol: Symbol,
        state: TradingState,
        score: f64,
    },

    /// **Trader**: an order was acknowledged (or simulated) and is now open.
    OrderCreated { exchange: String, order: Order },

    /// **Trader**: an order reached a filled status and was settled.
    OrderFilled { exchange: String, order: Order },

    /// **Trader**: an order was cancelled and its reservation released.
    OrderCanceled { exchange: String, order: Order },

    /// **Trader**: the portfolio was resynchronised from the exchange.
    PortfolioRefreshed {
        exchange: String,
        assets: Vec<(String, Decimal)>,
    },

    /// Non-fatal errors reported by a component.
    Error { component: String, message: String },
}

impl BotEvent {
    pub fn error(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error {
            component: component.into(),
            message: message.into(),
        }
    }
}

/// A wrapper around a tokio broadcast channel.
///
/// Slow subscribers skip old events (lagging) rather than blocking publishers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BotEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(256)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    pub fn publish(&self, event: BotEvent) {
        // No subscriber is a normal situation (e.g. headless runs).
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BotEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber() {
        let bus = EventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(BotEvent::error("decider", "boom"));

        for rx in [&mut first, &mut second] {
            match rx.recv().await.unwrap() {
                BotEvent::Error { component, message } => {
                    assert_eq!(component, "decider");
                    assert_eq!(message, "boom");
                }
                other => panic!("unexpected event {:?}", other),
            }
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        EventBus::new().publish(BotEvent::error("x", "y"));
    }
}
