//! # Trading Core Library
//!
//! Shared runtime plumbing for the trading bot.
//!
//! ## Modules
//! - `comms`: Market-data dispatcher (consumer queues and producer fan-out).
//! - `framework`: Per-symbol task scheduler, readiness tracking, event bus.
//! - `config`: Bot configuration loaded through the `config` crate.
//! - `args`: Standardized argument parsing.
//! - `fs`: Atomic state persistence and the previous trading state snapshot.

pub mod args;
pub mod comms;
pub mod config;
pub mod framework;
pub mod fs;
