//! Fixpoint dependency resolution
//!
//! Archives are tried pass after pass. A pass loads whatever has its
//! dependencies registered, drops permanent failures and keeps the rest for
//! the next pass. Resolution ends when nothing is pending or a full pass
//! changed nothing, so load order never has to be given up front.

use std::path::PathBuf;

use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::loader::{LoadOutcome, ModuleLoader};
use crate::registry::ModuleInfo;

/// An archive that never became loadable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    pub archive: PathBuf,
    pub id: String,
    /// Dependencies still missing when resolution stopped.
    pub missing: Vec<String>,
}

/// What one resolution run achieved.
#[derive(Debug, Default)]
pub struct ResolutionReport {
    /// Modules activated, in activation order.
    pub loaded: Vec<ModuleInfo>,
    pub failed: Vec<(PathBuf, LoadError)>,
    pub unresolved: Vec<Unresolved>,
    pub passes: usize,
}

impl ResolutionReport {
    pub fn loaded_ids(&self) -> Vec<&str> {
        self.loaded.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.unresolved.is_empty()
    }
}

/// Load as many of `archives` as their dependencies allow.
///
/// `on_loaded` runs right after each module is registered.
pub async fn resolve<F>(
    loader: &ModuleLoader,
    archives: Vec<PathBuf>,
    mut on_loaded: F,
) -> ResolutionReport
where
    F: FnMut(&ModuleInfo),
{
    let mut report = ResolutionReport::default();
    let mut pending = archives;
    let mut waiting: Vec<Unresolved> = Vec::new();

    while !pending.is_empty() {
        report.passes += 1;
        let mut progressed = false;
        let mut next = Vec::with_capacity(pending.len());
        waiting.clear();

        for archive in pending {
            match loader.load(&archive).await {
                LoadOutcome::Loaded(info) => {
                    progressed = true;
                    on_loaded(&info);
                    report.loaded.push(info);
                }
                LoadOutcome::Waiting { id, missing } => {
                    waiting.push(Unresolved {
                        archive: archive.clone(),
                        id,
                        missing,
                    });
                    next.push(archive);
                }
                LoadOutcome::Failed(e) => {
                    progressed = true;
                    report.failed.push((archive, e));
                }
            }
        }

        pending = next;
        debug!(
            "Resolution pass {} done: {} pending",
            report.passes,
            pending.len()
        );
        if !progressed {
            break;
        }
    }

    for unresolved in &waiting {
        warn!(
            "Module {} ({:?}) was not loaded: unmet dependencies {}",
            unresolved.id,
            unresolved.archive,
            unresolved.missing.join(", ")
        );
    }
    report.unresolved = waiting;

    info!(
        "Resolution finished after {} pass(es): {} loaded, {} failed, {} unresolved",
        report.passes,
        report.loaded.len(),
        report.failed.len(),
        report.unresolved.len()
    );
    report
}
