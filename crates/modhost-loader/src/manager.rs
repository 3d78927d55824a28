//! Module manager
//!
//! Owns the registry and coordinates loading, disabling, reloading and
//! updating modules. Registry mutation happens under the registry's own lock
//! and no lock is held while a module hook runs, so `activate` and
//! `deactivate` may call back into the manager. Reloads and swaps of one id
//! are serialized by a per-id claim, and so are update cycles.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::io;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use error_stack::{Report, ResultExt};
use futures::FutureExt;
use modhost_kernel::{Host, ModuleRegistrar};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::context::{ContextOptions, ContextTracker};
use crate::error::{LoadError, ManagerError, ManagerResult, UpdateError};
use crate::finalizer::{self, FinalizeReport, backup_path, staged_path};
use crate::loader::{LoadOutcome, ModuleLoader, panic_message};
use crate::registry::{ModuleInfo, ModuleRegistry};
use crate::resolver::{self, ResolutionReport};
use crate::update::{Release, UpdateOutcome, UpdatePipeline};

struct ManagerInner {
    host: Arc<dyn Host>,
    config: ManagerConfig,
    modules_dir: PathBuf,
    registry: Arc<ModuleRegistry>,
    loader: ModuleLoader,
    updates: UpdatePipeline,
    /// Archive of every module loaded since the last full reload.
    archives: Mutex<HashMap<String, PathBuf>>,
    /// Ids with a reload or swap in progress.
    transitions: ClaimSet,
    /// Ids with an update cycle between CHECK and the end of SWAP.
    updating: ClaimSet,
}

/// Set of ids some operation is working on.
#[derive(Clone, Default)]
struct ClaimSet(Arc<Mutex<HashSet<String>>>);

impl ClaimSet {
    /// `None` when the id is already claimed.
    fn claim(&self, id: &str) -> Option<Claim> {
        if !self.0.lock().insert(id.to_string()) {
            return None;
        }
        Some(Claim {
            set: self.clone(),
            id: id.to_string(),
        })
    }
}

/// Releases its id when dropped.
struct Claim {
    set: ClaimSet,
    id: String,
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.set.0.lock().remove(&self.id);
    }
}

/// Lifecycle controller for the modules of one host.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct ModuleManager {
    inner: Arc<ManagerInner>,
}

impl ModuleManager {
    /// Create a manager.
    ///
    /// `parent` holds the constructors the host links in statically; entry
    /// points not provided by a module's own library are resolved there.
    pub fn new(
        host: Arc<dyn Host>,
        parent: ModuleRegistrar,
        config: ManagerConfig,
    ) -> ManagerResult<Self> {
        let modules_dir = config.resolve_modules_dir(host.data_directory());
        let registry = Arc::new(ModuleRegistry::new());
        let context_options = ContextOptions::new(
            Arc::new(parent),
            config.resolve_native_cache_dir(&modules_dir),
        );
        let loader = ModuleLoader::new(
            host.clone(),
            registry.clone(),
            context_options,
            modules_dir.clone(),
            config.manifest_name.clone(),
        );
        let updates = UpdatePipeline::new(config.clone(), host.clone())
            .map_err(|e| Report::new(ManagerError::from(e)))
            .attach("building the update client")?;

        Ok(Self {
            inner: Arc::new(ManagerInner {
                host,
                config,
                modules_dir,
                registry,
                loader,
                updates,
                archives: Mutex::new(HashMap::new()),
                transitions: ClaimSet::default(),
                updating: ClaimSet::default(),
            }),
        })
    }

    /// Create a manager configured from the host's own configuration.
    pub fn from_host(host: Arc<dyn Host>, parent: ModuleRegistrar) -> ManagerResult<Self> {
        let config = ManagerConfig::from_host_config(host.config());
        Self::new(host, parent, config)
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.inner.host
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    pub fn modules_dir(&self) -> &Path {
        &self.inner.modules_dir
    }

    /// Tracks open isolated contexts.
    pub fn context_tracker(&self) -> &ContextTracker {
        self.inner.loader.tracker()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// id -> version of every loaded module.
    pub fn loaded_modules(&self) -> BTreeMap<String, String> {
        self.inner.registry.versions()
    }

    pub fn module_info(&self, id: &str) -> Option<ModuleInfo> {
        self.inner.registry.info(id)
    }

    /// Snapshots of every loaded module, sorted by id.
    pub fn module_infos(&self) -> Vec<ModuleInfo> {
        self.inner.registry.infos()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.inner.registry.contains(id)
    }

    /// Archives in the module directory, sorted by path.
    ///
    /// Staged, temporary and backup files are never candidates.
    pub fn discover_archives(&self) -> io::Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for entry in fs::read_dir(&self.inner.modules_dir)? {
            let path = entry?.path();
            let is_archive = path.is_file()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| self.inner.config.is_archive_name(n));
            if is_archive {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    }

    // ------------------------------------------------------------------
    // Loading
    // ------------------------------------------------------------------

    /// Complete swaps interrupted by a previous run.
    pub fn finalize_pending_updates(&self) -> ManagerResult<FinalizeReport> {
        finalizer::finalize_pending_updates(
            &self.inner.modules_dir,
            &self.inner.config.archive_extension,
            &self.inner.config.manifest_name,
        )
        .change_context_lazy(|| ManagerError::ModuleDirectory(self.inner.modules_dir.clone()))
        .attach("finalizing pending updates")
    }

    /// Finalize pending updates, then resolve every archive in the module
    /// directory.
    ///
    /// Fails only when the module directory cannot be created or read;
    /// individual module failures are part of the report.
    pub async fn load_all_modules(&self) -> ManagerResult<ResolutionReport> {
        let dir = &self.inner.modules_dir;
        fs::create_dir_all(dir)
            .change_context_lazy(|| ManagerError::ModuleDirectory(dir.clone()))
            .attach("creating module directory")?;

        let finalized = self.finalize_pending_updates()?;
        if !finalized.promoted.is_empty() {
            info!("Applied {} pending update(s)", finalized.promoted.len());
        }

        let archives = self
            .discover_archives()
            .change_context_lazy(|| ManagerError::ModuleDirectory(dir.clone()))
            .attach("scanning module directory")?;
        info!("Found {} module archive(s) in {:?}", archives.len(), dir);

        let report =
            resolver::resolve(&self.inner.loader, archives, |loaded| self.on_loaded(loaded)).await;
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Disable one module. Returns whether it was loaded.
    ///
    /// The module leaves the registry before its `deactivate` hook runs, so
    /// the hook may disable other modules.
    pub async fn disable_module(&self, id: &str) -> bool {
        let Some(detached) = self.inner.registry.remove(id) else {
            debug!("Module {} is not loaded", id);
            return false;
        };
        let mut module = detached.module;

        let host = self.inner.host.clone();
        let result = AssertUnwindSafe(module.instance.deactivate(host.clone(), host.executor()))
            .catch_unwind()
            .await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Module {} failed to deactivate: {}", id, e),
            Err(panic) => warn!(
                "Module {} panicked while deactivating: {}",
                id,
                panic_message(panic.as_ref())
            ),
        }

        drop(module);
        match detached.context {
            Some(mut context) => context.close(),
            None => warn!("Module {} had no isolated context", id),
        }
        info!("Disabled module {}", id);
        true
    }

    /// Disable every loaded module.
    pub async fn disable_all(&self) {
        for id in self.inner.registry.ids() {
            self.disable_module(&id).await;
        }
        for mut context in self.inner.registry.drain_contexts() {
            warn!("Closing orphaned context {}", context.id());
            context.close();
        }
    }

    /// Disable a module and load it again from the same archive.
    ///
    /// Also brings back a module disabled earlier in this run. Returns whether
    /// the module is loaded afterwards.
    pub async fn reload_module(&self, id: &str) -> bool {
        match self.try_reload_module(id).await {
            Ok(_) => true,
            Err(report) => {
                warn!("Module {} was not reloaded: {}", id, report.current_context());
                false
            }
        }
    }

    /// [`reload_module`](Self::reload_module) with the reason for a failure.
    pub async fn try_reload_module(&self, id: &str) -> ManagerResult<ModuleInfo> {
        let Some(_claim) = self.inner.transitions.claim(id) else {
            return Err(Report::new(ManagerError::Busy(id.to_string())));
        };
        let archive = self
            .inner
            .registry
            .info(id)
            .map(|info| info.archive)
            .or_else(|| self.inner.archives.lock().get(id).cloned())
            .ok_or_else(|| Report::new(ManagerError::NotFound(id.to_string())))?;

        self.disable_module(id).await;
        match self.inner.loader.load(&archive).await {
            LoadOutcome::Loaded(loaded) => {
                self.on_loaded(&loaded);
                Ok(loaded)
            }
            LoadOutcome::Waiting { missing, .. } => Err(Report::new(ManagerError::Load(
                LoadError::UnsatisfiedDependency {
                    id: id.to_string(),
                    missing,
                },
            ))
            .attach(format!("reloading {}", archive.display()))),
            LoadOutcome::Failed(e) => Err(Report::new(ManagerError::Load(e))
                .attach(format!("reloading {}", archive.display()))),
        }
    }

    /// Disable everything and resolve the module directory from scratch.
    pub async fn reload_all(&self) -> ManagerResult<ResolutionReport> {
        self.disable_all().await;
        self.inner.archives.lock().clear();
        self.load_all_modules().await
    }

    // ------------------------------------------------------------------
    // Updates
    // ------------------------------------------------------------------

    /// CHECK stage for one loaded module.
    pub async fn check_for_update(&self, id: &str) -> Result<Option<Release>, UpdateError> {
        let info = self
            .module_info(id)
            .ok_or_else(|| UpdateError::NotLoaded(id.to_string()))?;
        self.inner.updates.check(&info).await
    }

    /// Run a full update cycle for one module, inline.
    ///
    /// Returns [`UpdateOutcome::InProgress`] without touching the network
    /// when another cycle for the module has not finished yet.
    pub async fn update_now(&self, id: &str) -> Result<UpdateOutcome, UpdateError> {
        let info = self
            .module_info(id)
            .ok_or_else(|| UpdateError::NotLoaded(id.to_string()))?;
        if info.remote.is_none() {
            return Ok(UpdateOutcome::NoRemoteSource);
        }
        let Some(claim) = self.inner.updating.claim(id) else {
            debug!("Update of module {} is already in progress", id);
            return Ok(UpdateOutcome::InProgress);
        };

        let Some(release) = self.inner.updates.check(&info).await? else {
            return Ok(UpdateOutcome::UpToDate {
                version: info.version,
            });
        };
        self.inner.updates.download(&info, &release).await?;
        let swapped = self.swap(id).await;
        drop(claim);

        let updated = swapped?;
        self.after_swap(&info, &updated);
        Ok(UpdateOutcome::Applied {
            from: info.version,
            to: updated.version,
        })
    }

    /// SWAP stage: replace a module's archive with its staged update and
    /// load the new version.
    ///
    /// The old module is disabled before any file is touched. On failure it
    /// stays disabled and the `.bak` copy of its archive is kept.
    pub async fn swap_and_reload(&self, id: &str) -> Result<ModuleInfo, UpdateError> {
        let previous = self.module_info(id);
        let updated = self.swap(id).await?;
        if let Some(previous) = previous {
            self.after_swap(&previous, &updated);
        }
        Ok(updated)
    }

    async fn swap(&self, id: &str) -> Result<ModuleInfo, UpdateError> {
        let swap_error = |reason: String| {
            error!("Update of module {} failed: {}", id, reason);
            UpdateError::Swap {
                id: id.to_string(),
                reason,
            }
        };
        let Some(_claim) = self.inner.transitions.claim(id) else {
            return Err(swap_error("a reload or swap is already in progress".to_string()));
        };

        let info = self
            .inner
            .registry
            .info(id)
            .ok_or_else(|| UpdateError::NotLoaded(id.to_string()))?;
        let archive = info.archive.clone();
        let staged = staged_path(&archive);
        if !staged.is_file() {
            return Err(swap_error(format!("no staged update at {:?}", staged)));
        }

        self.disable_module(id).await;

        let backup = backup_path(&archive);
        if let Err(rename_err) = fs::rename(&archive, &backup) {
            warn!(
                "Could not back up {:?} ({}); deleting it instead",
                archive, rename_err
            );
            if let Err(e) = fs::remove_file(&archive) {
                return Err(swap_error(format!("cannot move old archive aside: {}", e)));
            }
        }
        if let Err(e) = fs::rename(&staged, &archive) {
            return Err(swap_error(format!("cannot move staged update into place: {}", e)));
        }

        match self.inner.loader.load(&archive).await {
            LoadOutcome::Loaded(loaded) => {
                match fs::remove_file(&backup) {
                    Ok(()) => {}
                    Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                    Err(e) => warn!("Failed to delete backup {:?}: {}", backup, e),
                }
                info!(
                    "Updated module {} from v{} to v{}",
                    id, info.version, loaded.version
                );
                self.record_archive(&loaded);
                Ok(loaded)
            }
            LoadOutcome::Waiting { missing, .. } => Err(swap_error(format!(
                "new version waits for {}",
                missing.join(", ")
            ))),
            LoadOutcome::Failed(e) => Err(swap_error(e.to_string())),
        }
    }

    /// Schedule the next cycle for a swapped-in module, unless the release
    /// carried the version that was already loaded.
    fn after_swap(&self, previous: &ModuleInfo, updated: &ModuleInfo) {
        if updated.version == previous.version {
            warn!(
                "Release for module {} still reports v{}; not checking again",
                updated.id, updated.version
            );
            return;
        }
        self.schedule_update_check(updated);
    }

    fn record_archive(&self, module: &ModuleInfo) {
        self.inner
            .archives
            .lock()
            .insert(module.id.clone(), module.archive.clone());
    }

    fn on_loaded(&self, module: &ModuleInfo) {
        self.record_archive(module);
        self.schedule_update_check(module);
    }

    /// Queue an update cycle for a freshly loaded module on the host's
    /// background executor. No-op without a remote source, when update
    /// checks are disabled or while another cycle for the id is in flight.
    fn schedule_update_check(&self, module: &ModuleInfo) {
        if !self.inner.config.check_updates || module.remote.is_none() {
            return;
        }
        let Some(claim) = self.inner.updating.claim(&module.id) else {
            debug!("Update of module {} is already in progress", module.id);
            return;
        };

        let manager = self.clone();
        let module = module.clone();
        self.inner.host.executor().spawn(async move {
            let id = module.id.clone();
            let cycle = AssertUnwindSafe(manager.run_update_cycle(module, claim)).catch_unwind();
            if let Err(panic) = cycle.await {
                error!(
                    "Update check for module {} panicked: {}",
                    id,
                    panic_message(panic.as_ref())
                );
            }
        });
    }

    /// CHECK and DOWNLOAD in the background; hand the swap to the host's
    /// serialized executor. The claim is held until the swap finishes.
    async fn run_update_cycle(self, module: ModuleInfo, claim: Claim) {
        let release = match self.inner.updates.check(&module).await {
            Ok(Some(release)) => release,
            Ok(None) => return,
            Err(e) => {
                warn!("Update check for module {} failed: {}", module.id, e);
                return;
            }
        };

        if let Err(e) = self.inner.updates.download(&module, &release).await {
            error!("Download of {} for module {} failed: {}", release.tag, module.id, e);
            return;
        }

        let manager = self.clone();
        let main = self.inner.host.main_executor();
        main.spawn(async move {
            // failures are logged inside the swap
            let swapped = manager.swap(&module.id).await;
            drop(claim);
            if let Ok(updated) = swapped {
                manager.after_swap(&module, &updated);
            }
        });
    }
}

impl std::fmt::Debug for ModuleManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleManager")
            .field("modules_dir", &self.inner.modules_dir)
            .field("registry", &self.inner.registry)
            .finish_non_exhaustive()
    }
}
