pub mod dispatcher;
pub mod market;

pub use dispatcher::{Consumer, ConsumerQueue, DispatchError, EventHandler, Producer};
pub use market::{MarketCache, MarketDispatcher};
