//! modhost CLI - load, inspect and update archive-packaged modules

mod cli;
mod commands;
mod error;
mod host;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use host::CliHost;
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run_command_async(cli))
}

async fn run_command_async(cli: Cli) -> anyhow::Result<()> {
    let handle = tokio::runtime::Handle::current();
    let host = Arc::new(CliHost::new(&cli.data_dir, cli.config.as_deref(), &handle)?);

    match cli.command {
        Commands::Run => commands::run::run(host).await?,
        Commands::List { json } => commands::list::run(host, json).await?,
        Commands::Finalize => commands::finalize::run(host)?,
        Commands::CheckUpdates => commands::check_updates::run(host).await?,
    }

    Ok(())
}
