//! `modhost run` command implementation

use std::sync::Arc;

use colored::Colorize;
use tracing::info;

use crate::error::CliError;
use crate::host::CliHost;

/// Execute the `modhost run` command
pub async fn run(host: Arc<CliHost>) -> Result<(), CliError> {
    let manager = super::manager(host.clone())?;
    println!(
        "{} Loading modules from {}",
        "→".green(),
        manager.modules_dir().display()
    );

    let report = manager.load_all_modules().await?;
    println!(
        "  {} module(s) loaded: {}",
        report.loaded.len(),
        report.loaded_ids().join(", ")
    );
    super::list::print_problems(&report);
    println!("  Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");

    host.flush().await;
    manager.disable_all().await;
    println!("{} Stopped", "✓".green());
    Ok(())
}
