//! `modhost finalize` command implementation

use std::sync::Arc;

use colored::Colorize;

use crate::error::CliError;
use crate::host::CliHost;

/// Execute the `modhost finalize` command
pub fn run(host: Arc<CliHost>) -> Result<(), CliError> {
    let manager = super::manager(host)?;
    println!(
        "{} Finalizing pending updates in {}",
        "→".green(),
        manager.modules_dir().display()
    );

    let report = manager.finalize_pending_updates()?;
    for path in &report.promoted {
        println!("  {} {}", "applied".green(), path.display());
    }
    for path in &report.discarded {
        println!("  {} {}", "discarded".yellow(), path.display());
    }
    for (path, err) in &report.failed {
        println!("  {} {}: {}", "failed".red(), path.display(), err);
    }
    if report.promoted.is_empty() && report.discarded.is_empty() && report.failed.is_empty() {
        println!("  Nothing to finalize.");
    }

    Ok(())
}
