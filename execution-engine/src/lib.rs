//! # Execution Engine
//!
//! Turns consolidated evaluations into orders on one exchange.
//!
//! ## Modules
//! - `decider`: Score to trading state, and the reaction to a state change.
//! - `planner`: Sizing, pricing and precision of the orders of a state.
//! - `engine`: The trader and the per-exchange wiring of every component.
//! - `evaluation`: The decision cycle run by each symbol's schedulers.
//! - `exchange`: The simulated exchange and the retrying gateway wrapper.
//! - `models`: Portfolio and sub-portfolio balances.
//! - `orders`: Open order tracking, simulated fills and status polling.
//! - `trades`: Trade history and paid fees.

pub mod decider;
pub mod engine;
pub mod evaluation;
pub mod exchange;
pub mod models;
pub mod orders;
pub mod planner;
pub mod trades;
