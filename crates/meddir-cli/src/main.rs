//! meddir CLI - Command-line interface for the offline-first records engine
//!
//! Provides commands for:
//! - Running sync cycles and full resynchronizations
//! - Viewing sync status and the pending operation log
//! - Managing the content cache
//! - Running the long-lived sync service
//! - Viewing and editing configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use meddir_core::config::Config;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;
mod output;
mod services;

use commands::{
    cache::CacheCommand, config::ConfigCommand, pending::PendingCommand, resync::ResyncCommand,
    run::RunCommand, status::StatusCommand, sync::SyncCommand, CommandContext,
};
use output::OutputFormat;

#[derive(Debug, Parser)]
#[command(
    name = "meddir",
    version,
    about = "Offline-first sync engine for the medical records directory"
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run one sync cycle (push pending operations, then pull)
    Sync(SyncCommand),
    /// Discard local state and pull everything from the remote
    Resync(ResyncCommand),
    /// Show synchronization status
    Status(StatusCommand),
    /// List queued operations
    Pending(PendingCommand),
    /// Manage the content cache
    #[command(subcommand)]
    Cache(CacheCommand),
    /// Run the sync service until interrupted
    Run(RunCommand),
    /// View and manage configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

fn init_tracing(verbose: u8, json: bool, config_level: &str) {
    let level = match verbose {
        0 => config_level,
        1 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_or_default(&config_path);

    init_tracing(cli.verbose, cli.json, &config.logging.level);
    debug!(config_path = %config_path.display(), "Configuration loaded");

    let ctx = CommandContext {
        config,
        config_path,
        format: OutputFormat::from_flags(cli.json),
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Sync(cmd) => cmd.execute(&ctx).await,
        Commands::Resync(cmd) => cmd.execute(&ctx).await,
        Commands::Status(cmd) => cmd.execute(&ctx).await,
        Commands::Pending(cmd) => cmd.execute(&ctx).await,
        Commands::Cache(cmd) => cmd.execute(&ctx).await,
        Commands::Run(cmd) => cmd.execute(&ctx).await,
        Commands::Config(cmd) => cmd.execute(&ctx).await,
    }
}
