//! Defines the command-line arguments of the trading bot binary.
//!
//! Only locations and run switches come from the command line; everything that
//! shapes trading behaviour lives in the configuration file.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Holds the parameters parsed from the command line.
#[derive(Parser, Debug, Clone, Serialize, Deserialize)]
#[command(author, version, about, long_about = None)]
pub struct BotArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = "config/bot.toml")]
    config: PathBuf,

    /// Path to the data directory (for state saving)
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,

    /// Discard the previous trading state and start cold
    #[arg(long, default_value_t = false)]
    reset_state: bool,

    /// Force simulation mode regardless of the configuration
    #[arg(long, default_value_t = false)]
    simulate: bool,
}

impl BotArgs {
    /// Parses an explicit argument vector (first item is the program name).
    pub fn parse_args(args: Vec<String>) -> Self {
        BotArgs::parse_from(args)
    }

    pub fn get_config(&self) -> PathBuf {
        self.config.clone()
    }

    /// Returns the path to the data directory.
    ///
    /// This directory holds the previous trading state file.
    pub fn get_data_dir(&self) -> PathBuf {
        self.data_dir.clone()
    }

    pub fn reset_state(&self) -> bool {
        self.reset_state
    }

    pub fn simulate(&self) -> bool {
        self.simulate
    }
}
