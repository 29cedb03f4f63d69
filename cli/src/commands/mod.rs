//! CLI command definitions and dispatch.

mod add;
mod export;
mod extract;
mod import;
mod info;
mod load;
mod prune;
mod remove;
mod save;
mod version;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use freighter_core::consts::DEFAULT_RETRIES;
use freighter_core::{FreighterConfig, LogLevel};
use freighter_store::{Layout, Retry, RetryPolicy};
use tokio_util::sync::CancellationToken;

/// Freighter - collect, store and ship artifacts into disconnected environments.
#[derive(Parser)]
#[command(name = "freighter", version, about)]
pub struct Cli {
    /// Freighter home directory (default: ~/.freighter)
    #[arg(long = "freighterdir", global = true)]
    pub freighter_dir: Option<PathBuf>,

    /// Content store directory (default: <freighterdir>/store)
    #[arg(short, long = "store", global = true)]
    pub store_dir: Option<PathBuf>,

    /// Scratch directory for archive staging (default: $FREIGHTER_TEMP_DIR)
    #[arg(long = "tempdir", global = true)]
    pub temp_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short, long, global = true, default_value = "warn")]
    pub log_level: LogLevel,

    /// Log interim retry failures as warnings instead of errors
    #[arg(long, global = true)]
    pub ignore_errors: bool,

    /// Attempts made for remote operations
    #[arg(long, global = true, default_value_t = DEFAULT_RETRIES)]
    pub retries: u32,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Command {
    /// Interact with the content store
    #[command(subcommand)]
    Store(StoreCommand),
    /// Show version information
    Version(version::VersionArgs),
}

/// `freighter store` subcommands.
#[derive(Subcommand)]
pub enum StoreCommand {
    /// List the contents of the store
    Info(info::InfoArgs),
    /// Extract stored content to disk
    Extract(extract::ExtractArgs),
    /// Add a local file to the store
    Add(add::AddArgs),
    /// Save an artifact from a registry into the store
    Save(save::SaveArgs),
    /// Push stored artifacts to a registry
    Load(load::LoadArgs),
    /// Pack the store into a compressed archive
    Export(export::ExportArgs),
    /// Unpack store archives into the store
    Import(import::ImportArgs),
    /// Remove references from the store
    #[command(alias = "rm")]
    Remove(remove::RemoveArgs),
    /// Delete blobs no longer reachable from any reference
    Prune(prune::PruneArgs),
}

/// Per-invocation state shared by every command.
pub struct Context {
    pub config: FreighterConfig,
    pub cancel: CancellationToken,
}

impl Context {
    /// Build the effective configuration: environment first, flags on top.
    pub fn new(cli: &Cli, cancel: CancellationToken) -> Self {
        let mut config = FreighterConfig::from_env();
        if let Some(dir) = &cli.freighter_dir {
            config = config.with_freighter_dir(dir);
        }
        if let Some(dir) = &cli.store_dir {
            config.store_dir = dir.clone();
        }
        if let Some(dir) = &cli.temp_dir {
            config.temp_dir = dir.clone();
        }
        config.ignore_errors |= cli.ignore_errors;
        config.retries = cli.retries;
        config.log_level = cli.log_level;
        Self { config, cancel }
    }

    /// Open (creating if needed) the configured store.
    pub(crate) async fn open_layout(&self) -> Result<Layout, Box<dyn std::error::Error>> {
        let span = tracing::info_span!("store", root = %self.config.store_dir.display());
        let layout = Layout::open(&self.config.store_dir).await?.with_span(span);
        Ok(layout)
    }

    pub(crate) fn retry(&self) -> Retry {
        Retry::new(RetryPolicy::from_config(&self.config))
    }
}

/// Dispatch a parsed CLI to the appropriate command handler.
pub async fn dispatch(cli: Cli, cancel: CancellationToken) -> Result<(), Box<dyn std::error::Error>> {
    let ctx = Context::new(&cli, cancel);
    match cli.command {
        Command::Store(command) => match command {
            StoreCommand::Info(args) => info::execute(&ctx, args).await,
            StoreCommand::Extract(args) => extract::execute(&ctx, args).await,
            StoreCommand::Add(args) => add::execute(&ctx, args).await,
            StoreCommand::Save(args) => save::execute(&ctx, args).await,
            StoreCommand::Load(args) => load::execute(&ctx, args).await,
            StoreCommand::Export(args) => export::execute(&ctx, args).await,
            StoreCommand::Import(args) => import::execute(&ctx, args).await,
            StoreCommand::Remove(args) => remove::execute(&ctx, args).await,
            StoreCommand::Prune(args) => prune::execute(&ctx, args).await,
        },
        Command::Version(args) => version::execute(args).await,
    }
}
