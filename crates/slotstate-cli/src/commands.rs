//! Command handlers for the slotstate CLI

use serde::Serialize;
use slotstate_core::{CloneMode, FileStorage};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cli::{Cli, Commands};
use crate::config::AppConfig;
use crate::error::Result;
use crate::scenarios;

/// Parked reads in the suspend scenario wait this long before the next commit
const PARK_FOR: Duration = Duration::from_millis(100);

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli, config: AppConfig) -> Result<()> {
        let trace_events = cli.trace_events;
        match cli.command {
            Commands::Counter { delays, shared } => {
                Self::handle_counter_command(config, trace_events, delays, shared).await
            }
            Commands::Suspend => Self::handle_suspend_command(config, trace_events).await,
            Commands::Persist { dir, ttl_secs } => {
                Self::handle_persist_command(config, trace_events, dir, ttl_secs).await
            }
            Commands::Inspect => Self::handle_inspect_command(config, trace_events).await,
        }
    }

    async fn handle_counter_command(
        mut config: AppConfig,
        trace_events: bool,
        delays: Vec<u64>,
        shared: bool,
    ) -> Result<()> {
        if shared {
            config.store.clone_mode = CloneMode::Shared;
        }
        info!("Submitting {} increments with delays {:?}", delays.len(), delays);

        let store = scenarios::build_store(config.store, trace_events);
        let report = scenarios::run_counter(&store, &delays).await?;
        print_report(&report)
    }

    async fn handle_suspend_command(config: AppConfig, trace_events: bool) -> Result<()> {
        let store = scenarios::build_store(config.store, trace_events);
        let report = scenarios::run_suspend(&store, PARK_FOR).await?;
        print_report(&report)
    }

    async fn handle_persist_command(
        mut config: AppConfig,
        trace_events: bool,
        dir: Option<PathBuf>,
        ttl_secs: Option<u64>,
    ) -> Result<()> {
        if let Some(dir) = dir {
            config.storage.dir = dir;
        }
        if ttl_secs.is_some() {
            config.storage.ttl_secs = ttl_secs;
        }
        info!("Using storage directory {}", config.storage.dir.display());

        let storage = Arc::new(FileStorage::open(&config.storage.dir)?);
        let store = scenarios::build_store(config.store, trace_events);
        let report = scenarios::run_persist(&store, storage, config.storage.ttl()).await?;
        print_report(&report)
    }

    async fn handle_inspect_command(config: AppConfig, trace_events: bool) -> Result<()> {
        let store = scenarios::build_store(config.store, trace_events);
        let report = scenarios::run_inspect(&store).await?;
        print_report(&report)
    }
}

fn print_report<R: Serialize>(report: &R) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
