//! `modhost check-updates` command implementation

use std::sync::Arc;

use colored::Colorize;
use modhost_loader::UpdateOutcome;

use crate::error::CliError;
use crate::host::CliHost;

/// Execute the `modhost check-updates` command
///
/// Updates run inline, one module at a time, instead of through the
/// background scheduler.
pub async fn run(host: Arc<CliHost>) -> Result<(), CliError> {
    let manager = super::inline_manager(host)?;
    manager.load_all_modules().await?;

    let candidates: Vec<_> = manager
        .module_infos()
        .into_iter()
        .filter(|m| m.remote.is_some())
        .collect();
    println!(
        "{} Checking {} module(s) for updates",
        "→".green(),
        candidates.len()
    );

    let mut failures = 0;
    for module in candidates {
        match manager.update_now(&module.id).await {
            Ok(UpdateOutcome::Applied { from, to }) => {
                println!("  {} {} {} -> {}", "updated".green(), module.id, from, to)
            }
            Ok(UpdateOutcome::UpToDate { version }) => {
                println!("  {} {} ({})", "current".dimmed(), module.id, version)
            }
            Ok(UpdateOutcome::InProgress) => {
                println!("  {} {} (update already running)", "busy".yellow(), module.id)
            }
            Ok(UpdateOutcome::NoRemoteSource) => {}
            Err(e) => {
                failures += 1;
                println!("  {} {}: {}", "failed".red(), module.id, e);
            }
        }
    }

    manager.disable_all().await;
    if failures > 0 {
        println!("{} {} update(s) failed", "!".yellow(), failures);
    }
    Ok(())
}
