//! CrossCheck CLI entrypoint.

use clap::Parser;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod commands;
mod handlers;
mod reporter;

use commands::{CacheCommands, Commands};

#[derive(Parser)]
#[command(name = "crosscheck")]
#[command(author, version, about = "Multi-target build-verification orchestrator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let code = match cli.command {
        Commands::Init => handlers::init().await?,
        Commands::Validate { path } => handlers::validate(path.as_deref()).await?,
        Commands::Plan {
            config,
            event,
            branch,
        } => handlers::plan(config.as_deref(), &event, branch.as_deref()).await?,
        Commands::Run {
            config,
            event,
            branch,
            fail_fast,
            json,
            cache_dir,
        } => {
            handlers::run(
                config.as_deref(),
                &event,
                branch.as_deref(),
                fail_fast,
                json,
                cache_dir,
            )
            .await?
        }
        Commands::Cache { command } => match command {
            CacheCommands::List { cache_dir } => handlers::list_cache(cache_dir).await?,
            CacheCommands::Clear { prefix, cache_dir } => {
                handlers::clear_cache(prefix.as_deref(), cache_dir).await?
            }
        },
    };

    Ok(code)
}
