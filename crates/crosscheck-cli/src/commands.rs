//! CLI command definitions.

use clap::Subcommand;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter workflow file
    Init,

    /// Validate a workflow file
    Validate {
        /// Path to the workflow file (discovered if omitted)
        path: Option<String>,
    },

    /// Show the trigger decision and matrix expansion for an event
    Plan {
        /// Path to the workflow file (discovered if omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Event kind (push or pull_request)
        #[arg(short, long)]
        event: String,

        /// Branch the event targets
        #[arg(short, long)]
        branch: Option<String>,
    },

    /// Evaluate an event and execute the applicable jobs locally
    Run {
        /// Path to the workflow file (discovered if omitted)
        #[arg(short, long)]
        config: Option<String>,

        /// Event kind (push or pull_request)
        #[arg(short, long)]
        event: String,

        /// Branch the event targets
        #[arg(short, long)]
        branch: Option<String>,

        /// Cancel remaining jobs after the first failure
        #[arg(long)]
        fail_fast: bool,

        /// Emit the run outcome as JSON
        #[arg(long)]
        json: bool,

        /// Cache directory (defaults to .crosscheck/cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Manage the provisioning cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
pub enum CacheCommands {
    /// List cache entries
    List {
        /// Cache directory (defaults to .crosscheck/cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },

    /// Clear cache entries
    Clear {
        /// Only clear entries with this key prefix
        prefix: Option<String>,

        /// Cache directory (defaults to .crosscheck/cache)
        #[arg(long)]
        cache_dir: Option<PathBuf>,
    },
}
