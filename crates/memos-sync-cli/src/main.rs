//! memos-sync CLI - mirror a Memos server into a local folder
//!
//! One-shot syncs, dry runs, a periodic watch mode and settings editing.

mod cli;
mod commands;
mod error;

use clap::Parser;
use memos_sync_core::sync::LogNotifier;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::common::{
    build_runner, resolve_settings_path, resolve_vault, ConsoleNotifier,
};
use crate::commands::config::run_config;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("memos_sync=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings_path = resolve_settings_path(cli.config)?;

    match cli.command {
        Commands::Sync { dry_run, json } => {
            let vault = resolve_vault(cli.vault)?;
            let runner =
                build_runner(&settings_path, &vault, !cli.no_frontmatter, ConsoleNotifier)?;
            run_sync(&runner, dry_run, json).await?;
        }
        Commands::Watch => {
            let vault = resolve_vault(cli.vault)?;
            let runner = build_runner(&settings_path, &vault, !cli.no_frontmatter, LogNotifier)?;
            run_watch(runner).await?;
        }
        Commands::Config { command } => run_config(command, &settings_path).await?,
    }

    Ok(())
}
