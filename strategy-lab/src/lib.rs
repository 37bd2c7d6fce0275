//! # Strategy Lab
//!
//! Evaluation side of the bot: signal producers write notes into an
//! `EvaluationMatrix`, a `StrategyAggregator` blends them into the single
//! score the trading state decider consumes.
//!
//! ## Modules
//! - `matrix`: the versioned note matrix and its shared copy-on-write handle.
//! - `history`: bounded log of matrix snapshots.
//! - `producer`: the `SignalProducer` trait and the blocking adapter.
//! - `producers`: built-in producers.
//! - `aggregator`: strategies combining the matrix into one score.
//! - `registry`: name-based construction of producers and strategies.

pub mod aggregator;
pub mod history;
pub mod matrix;
pub mod producer;
pub mod producers;
pub mod registry;

pub use aggregator::{finalize, InstantSocialReactionStrategy, MixedStrategy, StrategyAggregator};
pub use history::MatrixHistory;
pub use matrix::{Category, EvaluationMatrix, NoteValue, SharedMatrix};
pub use producer::{BlockingProducer, ProducerContext, SignalProducer, SyncProducer};
pub use registry::{EvaluatorRegistry, ProducerSettings};
