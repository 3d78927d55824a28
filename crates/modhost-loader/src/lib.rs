//! modhost loader
//!
//! Loads modules packaged as archives from a host's module directory:
//!
//! - [`descriptor`]: manifest decoding
//! - [`context`]: one isolated context per module, optionally backed by a
//!   native library shipped in the archive
//! - [`loader`] / [`resolver`]: single-module activation and fixpoint
//!   dependency resolution
//! - [`manager`]: the lifecycle controller (disable, reload, swap)
//! - [`update`] / [`finalizer`]: release-based updates and recovery of
//!   interrupted swaps
//!
//! ```rust,ignore
//! let manager = ModuleManager::from_host(host, registrar)?;
//! let report = manager.load_all_modules().await?;
//! println!("loaded: {:?}", report.loaded_ids());
//! ```

pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod finalizer;
pub mod license;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod resolver;
pub mod update;
pub mod version;

pub use config::ManagerConfig;
pub use context::{ContextOptions, ContextTracker, IsolatedContext};
pub use descriptor::{ModuleDescriptor, Provider, RemoteSource, read_descriptor};
pub use error::{LoadError, ManagerError, ManagerResult, UpdateError};
pub use finalizer::{FinalizeReport, finalize_pending_updates};
pub use loader::{LoadOutcome, ModuleLoader};
pub use manager::ModuleManager;
pub use registry::{ModuleInfo, ModuleRegistry};
pub use resolver::{ResolutionReport, Unresolved};
pub use update::{Release, UpdateOutcome, UpdatePipeline};
pub use version::ModuleVersion;
