pub mod execution;
pub mod market;
pub mod market_data;
pub mod order;
pub mod portfolio;
pub mod state;
pub mod symbol;
pub mod time_frame;
pub mod trade;
