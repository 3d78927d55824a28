//! Typed errors raised by module code.

use thiserror::Error;

/// Errors a module can report from its constructor or lifecycle hooks.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleError {
    /// The module's constructor could not build an instance.
    #[error("Module construction failed: {0}")]
    ConstructionFailed(String),

    /// The module failed during its activation hook.
    #[error("Module activation failed: {0}")]
    ActivationFailed(String),

    /// The module failed during its deactivation hook.
    #[error("Module deactivation failed: {0}")]
    DeactivationFailed(String),

    /// Module-side configuration is invalid or missing.
    #[error("Module configuration error: {0}")]
    ConfigError(String),

    /// An I/O error surfaced inside a module hook.
    #[error("Module I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for errors that don't fit the above categories.
    #[error("{0}")]
    Other(String),
}

impl From<String> for ModuleError {
    fn from(message: String) -> Self {
        ModuleError::Other(message)
    }
}

impl From<&str> for ModuleError {
    fn from(message: &str) -> Self {
        ModuleError::Other(message.to_string())
    }
}
