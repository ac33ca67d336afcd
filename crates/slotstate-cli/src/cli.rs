//! Command-line interface definitions and parsing

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path (TOML store configuration)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log every store event through tracing
    #[arg(long)]
    pub trace_events: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit concurrent increments and show they commit in order
    Counter {
        /// Transform delay of each increment, in milliseconds
        #[arg(short, long, value_delimiter = ',', default_value = "300,100,50")]
        delays: Vec<u64>,

        /// Hand out committed values without cloning
        #[arg(long)]
        shared: bool,
    },
    /// Park a read on a suspended slot and resume it with a new commit
    Suspend,
    /// Count visits in a slot persisted to disk
    Persist {
        /// Storage directory
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// Discard stored values older than this many seconds
        #[arg(long)]
        ttl_secs: Option<u64>,
    },
    /// Print slot diagnostics as JSON after a short workload
    Inspect,
}
