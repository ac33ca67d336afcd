//! slotstate CLI library
//!
//! Command-line parsing, configuration loading and the scripted scenarios
//! the `slotstate` binary runs against the engine.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod scenarios;

pub use cli::{Cli, Commands};
pub use commands::CommandDispatcher;
pub use config::AppConfig;
pub use error::{CliError, Result};
