//! `modhost list` command implementation

use std::sync::Arc;

use colored::Colorize;
use comfy_table::{ContentArrangement, Table};
use modhost_loader::{ModuleInfo, ResolutionReport};

use crate::error::CliError;
use crate::host::CliHost;

/// Execute the `modhost list` command
pub async fn run(host: Arc<CliHost>, json: bool) -> Result<(), CliError> {
    let manager = super::inline_manager(host)?;
    let report = manager.load_all_modules().await?;
    let modules = manager.module_infos();

    if json {
        let out = serde_json::to_string_pretty(&modules)
            .map_err(|e| CliError::Manager(e.to_string()))?;
        println!("{}", out);
    } else {
        print_table(&modules);
        print_problems(&report);
    }

    manager.disable_all().await;
    Ok(())
}

fn print_table(modules: &[ModuleInfo]) {
    if modules.is_empty() {
        println!("  No modules loaded.");
        return;
    }

    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "VERSION", "ARCHIVE", "REMOTE"]);
    for module in modules {
        let archive = module
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let remote = module
            .remote
            .as_ref()
            .map(|r| format!("{}:{}", r.provider, r.slug()))
            .unwrap_or_else(|| "-".to_string());
        table.add_row(vec![module.id.clone(), module.version.clone(), archive, remote]);
    }
    println!("{table}");
}

/// Report failed and unresolved modules after a resolution run.
pub fn print_problems(report: &ResolutionReport) {
    for (archive, err) in &report.failed {
        println!("  {} {}: {}", "failed".red(), archive.display(), err);
    }
    for unresolved in &report.unresolved {
        println!(
            "  {} {} waits for {}",
            "unresolved".yellow(),
            unresolved.id,
            unresolved.missing.join(", ")
        );
    }
}
