//! Built-in signal producers.

pub mod instant_fluctuations;
pub mod trade_momentum;

pub use instant_fluctuations::InstantFluctuations;
pub use trade_momentum::TradeMomentum;
