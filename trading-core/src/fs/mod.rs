pub mod persistence;
pub mod previous_state;

pub use persistence::{load_state, remove_state, save_state};
pub use previous_state::{ExchangeTradingState, PreviousStateManager, StateUpdate, MAX_SAVED_TRADES};
