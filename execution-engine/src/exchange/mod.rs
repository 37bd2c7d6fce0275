//! Gateways the engine trades through.
//!
//! `SimulatedGateway` is an in-memory exchange; `RetryingGateway` wraps any
//! gateway with a retry policy for transient failures.

pub mod retry;
pub mod simulated;

pub use retry::RetryingGateway;
pub use simulated::SimulatedGateway;
