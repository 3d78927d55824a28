//! Error types for the module loader.
//!
//! Per-module failures ([`LoadError`], [`UpdateError`]) are values: they are
//! logged where they occur and never escape the resolution loop, the update
//! pipeline or the lifecycle controller. [`ManagerError`] wrapped in an
//! [`error_stack::Report`] is reserved for what a caller must act on, chiefly
//! an unusable module directory.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single module could not be activated.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    /// Manifest missing or lacking a required field.
    #[error("Malformed descriptor in {archive:?}: {reason}")]
    MalformedDescriptor { archive: PathBuf, reason: String },

    /// Another archive already registered this id.
    #[error("Duplicate module id: {0}")]
    DuplicateId(String),

    /// Required module ids are not (yet) registered.
    #[error("Module {id} is waiting for: {}", missing.join(", "))]
    UnsatisfiedDependency { id: String, missing: Vec<String> },

    /// A host-level plugin the module depends on is not enabled.
    #[error("Module {id} requires host plugin {plugin}, which is not enabled")]
    MissingHostPlugin { id: String, plugin: String },

    /// The entry point does not resolve to a module constructor.
    #[error("Entry point {entry_point} of module {id} does not provide a module")]
    ContractViolation { id: String, entry_point: String },

    /// The constructor failed or panicked.
    #[error("Failed to instantiate module {id}: {reason}")]
    Instantiation { id: String, reason: String },

    /// The activation hook failed or panicked.
    #[error("Failed to activate module {id}: {reason}")]
    Activation { id: String, reason: String },

    /// The license gate returned false.
    #[error("License rejected for module {0}")]
    LicenseRejected(String),

    /// The isolated context could not be opened.
    #[error("Isolated context error for {archive:?}: {reason}")]
    Context { archive: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why an update cycle for a module ended without applying a new version.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum UpdateError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    /// The release carries no asset with the archive extension.
    #[error("No .{extension} asset found in the latest release of {repository}")]
    NoAsset {
        repository: String,
        extension: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A step of the file swap or the reload of the new archive failed.
    #[error("Swap of module {id} failed: {reason}")]
    Swap { id: String, reason: String },

    #[error("Module {0} is not loaded")]
    NotLoaded(String),

    #[error("Unsupported update provider: {0}")]
    UnsupportedProvider(String),
}

/// Errors surfaced by [`ModuleManager`](crate::ModuleManager) operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ManagerError {
    /// The module directory could not be created or read.
    #[error("Module directory unavailable: {0:?}")]
    ModuleDirectory(PathBuf),

    /// No archive is known for the id.
    #[error("Module not found: {0}")]
    NotFound(String),

    /// Another reload or swap of the module has not finished.
    #[error("Module {0} is busy with another reload or swap")]
    Busy(String),

    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("Update error: {0}")]
    Update(#[from] UpdateError),
}

/// Convenience result alias using [`error_stack::Report`].
pub type ManagerResult<T> = Result<T, error_stack::Report<ManagerError>>;
