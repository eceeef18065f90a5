//! CLI module: Clap argument parser, output helpers, and command implementations.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::Parser;

use crate::bootstrap::{StoreBootstrap, StoreHandle};
use crate::config::Settings;
use crate::errors::Result;

/// notme CLI: encrypted local notification log.
#[derive(Parser)]
#[command(name = "notme", about = "Encrypted local notification log", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Data directory holding the store, keys and preferences
    #[arg(long, env = "NOTME_DATA_DIR", default_value = ".notme", global = true)]
    pub data_dir: PathBuf,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Bootstrap the store (create keys, migrate a legacy store)
    Init,

    /// Show paths, key backend and migration state
    Status,

    /// Record one notification
    Add {
        /// Package name of the posting app (e.g. com.whatsapp)
        package: String,
        /// Notification title
        #[arg(long)]
        title: Option<String>,
        /// Notification text
        #[arg(long)]
        text: Option<String>,
        /// Notification category (e.g. msg, email)
        #[arg(long)]
        category: Option<String>,
        /// Mark as an ongoing notification
        #[arg(long)]
        ongoing: bool,
        /// Number of actions attached to the notification
        #[arg(long, default_value = "0")]
        actions: i64,
        /// Capture time, `YYYY-MM-DD HH:MM:SS` (default: now)
        #[arg(long)]
        timestamp: Option<String>,
    },

    /// List stored notifications, newest first
    List {
        /// Show at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Search notifications by text, package or category
    Search {
        /// Substring to match in package, title or text
        query: String,
        /// Only this package
        #[arg(long)]
        package: Option<String>,
        /// Only this category
        #[arg(long)]
        category: Option<String>,
        /// Sort order: newest (default), oldest or package
        #[arg(long, default_value = "newest")]
        sort: String,
        /// Show at most this many rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show store statistics
    Stats {
        /// Break down counts by: package, category, hour or day
        #[arg(long)]
        by: Option<String>,
    },

    /// Delete every stored notification
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Reclaim free space in the store file
    Compact,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Resolve `--data-dir` against the current directory.
pub fn data_dir(cli: &Cli) -> Result<PathBuf> {
    if cli.data_dir.is_absolute() {
        return Ok(cli.data_dir.clone());
    }
    Ok(std::env::current_dir()?.join(&cli.data_dir))
}

/// The process-wide bootstrap for this invocation's data directory.
pub fn bootstrap(cli: &Cli) -> Result<&'static StoreBootstrap> {
    let dir = data_dir(cli)?;
    let settings = Settings::load(&dir)?;
    StoreBootstrap::global(&dir, &settings)
}

/// Bootstrap and return the store, warning if migration was skipped.
pub fn open_store(cli: &Cli) -> Result<StoreHandle> {
    let handle = bootstrap(cli)?.get_store()?;
    if let Some(e) = handle.migration_error() {
        output::warning(&format!(
            "Legacy store migration did not complete ({e}); it will be retried next run."
        ));
    }
    Ok(handle)
}
