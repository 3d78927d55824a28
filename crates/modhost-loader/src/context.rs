//! Isolated module contexts
//!
//! Every loaded module owns exactly one [`IsolatedContext`]. The context holds
//! the module's archive open and, when the archive ships a native library,
//! loads a private copy of it so the library's symbols never collide with
//! another module's. Entry points are resolved in the context's own
//! constructor table first and then in the host's parent table, so a module
//! can use host-provided constructors while the host never sees the module's.

use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use libloading::{Library, Symbol};
use modhost_kernel::{
    MODULE_API_VERSION, MODULE_API_VERSION_SYMBOL, MODULE_REGISTER_SYMBOL, ModuleApiVersionFn,
    ModuleConstructor, ModuleRegisterFn, ModuleRegistrar,
};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::error::LoadError;

/// Counts contexts that are open right now.
#[derive(Debug, Clone, Default)]
pub struct ContextTracker {
    open: Arc<AtomicUsize>,
}

impl ContextTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }

    fn opened(&self) {
        self.open.fetch_add(1, Ordering::SeqCst);
    }

    fn closed(&self) {
        self.open.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Settings shared by every context a loader opens.
#[derive(Debug, Clone)]
pub struct ContextOptions {
    /// Fallback constructor table supplied by the host.
    pub parent: Arc<ModuleRegistrar>,
    /// Directory native libraries are extracted to before loading.
    pub native_cache_dir: PathBuf,
    /// Load native libraries found in archives.
    pub load_native: bool,
    pub tracker: ContextTracker,
}

impl ContextOptions {
    pub fn new(parent: Arc<ModuleRegistrar>, native_cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            parent,
            native_cache_dir: native_cache_dir.into(),
            load_native: true,
            tracker: ContextTracker::new(),
        }
    }
}

/// A private copy of a module's native library.
struct NativeLibrary {
    library: Library,
    path: PathBuf,
    hash: String,
}

impl NativeLibrary {
    /// Extract `entry` from the archive and load it.
    fn extract_and_load(
        archive: &mut ZipArchive<File>,
        entry: &str,
        cache_dir: &Path,
        context_id: &str,
    ) -> Result<Self, String> {
        let mut bytes = Vec::new();
        archive
            .by_name(entry)
            .map_err(|e| e.to_string())?
            .read_to_end(&mut bytes)
            .map_err(|e| e.to_string())?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = format!("{:x}", hasher.finalize());

        fs::create_dir_all(cache_dir).map_err(|e| e.to_string())?;
        let path = cache_dir.join(format!(
            "{}-{}.{}",
            &hash[..16],
            context_id,
            std::env::consts::DLL_EXTENSION
        ));
        fs::write(&path, &bytes).map_err(|e| e.to_string())?;

        // SAFETY: loading runs the library's initialisers; archives are trusted
        // to the same degree as the host binary.
        let library = match unsafe { Library::new(&path) } {
            Ok(library) => library,
            Err(e) => {
                let _ = fs::remove_file(&path);
                return Err(e.to_string());
            }
        };

        Ok(Self {
            library,
            path,
            hash,
        })
    }

    /// Check the ABI version and let the library register its constructors.
    fn register_into(&self, registrar: &mut ModuleRegistrar) -> Result<(), String> {
        unsafe {
            let version: Symbol<ModuleApiVersionFn> = self
                .library
                .get(MODULE_API_VERSION_SYMBOL)
                .map_err(|e| format!("_module_api_version: {}", e))?;
            let actual = version();
            if actual != MODULE_API_VERSION {
                return Err(format!(
                    "API version mismatch: expected {}, got {}",
                    MODULE_API_VERSION, actual
                ));
            }

            let register: Symbol<ModuleRegisterFn> = self
                .library
                .get(MODULE_REGISTER_SYMBOL)
                .map_err(|e| format!("_module_register: {}", e))?;
            register(registrar);
        }
        Ok(())
    }

    fn unload(self) {
        if let Err(e) = self.library.close() {
            warn!("Failed to unload native library {:?}: {}", self.path, e);
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove extracted library {:?}: {}", self.path, e);
        }
    }
}

struct OpenState {
    archive: ZipArchive<File>,
    registrar: ModuleRegistrar,
    parent: Arc<ModuleRegistrar>,
    native: Option<NativeLibrary>,
}

/// Namespace and resource scope of one loaded module.
///
/// Any module instance created from this context must be dropped before the
/// context is closed.
pub struct IsolatedContext {
    id: String,
    archive_path: PathBuf,
    state: Option<OpenState>,
    tracker: ContextTracker,
}

impl IsolatedContext {
    /// Open a context over an archive.
    pub fn open(archive_path: &Path, options: &ContextOptions) -> Result<Self, LoadError> {
        let id = uuid::Uuid::now_v7().simple().to_string();
        let context_err = |reason: String| LoadError::Context {
            archive: archive_path.to_path_buf(),
            reason,
        };

        let file = File::open(archive_path)?;
        let mut archive = ZipArchive::new(file).map_err(|e| context_err(e.to_string()))?;

        let mut registrar = ModuleRegistrar::new();
        let native = match find_native_library(&archive) {
            Some(entry) if options.load_native => {
                let native = NativeLibrary::extract_and_load(
                    &mut archive,
                    &entry,
                    &options.native_cache_dir,
                    &id,
                )
                .map_err(&context_err)?;
                if let Err(reason) = native.register_into(&mut registrar) {
                    registrar.clear();
                    native.unload();
                    return Err(context_err(reason));
                }
                debug!(
                    "Loaded native library {} ({}) for {:?}",
                    entry, native.hash, archive_path
                );
                Some(native)
            }
            _ => None,
        };

        options.tracker.opened();
        debug!("Opened context {} for {:?}", id, archive_path);

        Ok(Self {
            id,
            archive_path: archive_path.to_path_buf(),
            state: Some(OpenState {
                archive,
                registrar,
                parent: options.parent.clone(),
                native,
            }),
            tracker: options.tracker.clone(),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn archive_path(&self) -> &Path {
        &self.archive_path
    }

    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Whether the archive ships a native library that was loaded.
    pub fn has_native_library(&self) -> bool {
        self.state.as_ref().is_some_and(|s| s.native.is_some())
    }

    /// Whether the archive contains an entry with this name.
    pub fn contains_resource(&self, name: &str) -> bool {
        self.state
            .as_ref()
            .is_some_and(|s| s.archive.index_for_name(name).is_some())
    }

    /// Resolve an entry point: own constructors first, then the host's.
    pub fn resolve(&self, entry_point: &str) -> Option<ModuleConstructor> {
        let state = self.state.as_ref()?;
        state
            .registrar
            .get(entry_point)
            .or_else(|| state.parent.get(entry_point))
    }

    /// Release everything the context holds. Closing twice is a no-op.
    pub fn close(&mut self) {
        let Some(state) = self.state.take() else {
            return;
        };
        let OpenState {
            archive,
            mut registrar,
            parent,
            native,
        } = state;

        // constructors may point into the library
        registrar.clear();
        drop(parent);
        drop(archive);
        if let Some(native) = native {
            native.unload();
        }

        self.tracker.closed();
        debug!("Closed context {} for {:?}", self.id, self.archive_path);
    }
}

impl Drop for IsolatedContext {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for IsolatedContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IsolatedContext")
            .field("id", &self.id)
            .field("archive_path", &self.archive_path)
            .field("open", &self.is_open())
            .finish()
    }
}

fn find_native_library(archive: &ZipArchive<File>) -> Option<String> {
    let suffix = format!(".{}", std::env::consts::DLL_EXTENSION);
    archive
        .file_names()
        .find(|name| name.ends_with(&suffix) && !name.ends_with('/'))
        .map(str::to_string)
}
