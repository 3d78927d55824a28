//! Host application seams
//!
//! The loader never talks to the embedding application directly; it goes
//! through [`Host`] for directories, configuration, plugin-enablement checks
//! and the two execution contexts it relies on.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::executor::TaskExecutor;
use crate::logging::ModuleLogger;

/// Read access to the host's configuration store.
pub trait HostConfig: Send + Sync {
    /// Get a string value, or `default` when the key is missing.
    fn get_string(&self, key: &str, default: &str) -> String;

    /// Get a boolean value, or `default` when the key is missing or not a boolean.
    fn get_bool(&self, key: &str, default: bool) -> bool;

    /// Get a string value, treating missing and blank values as absent.
    fn get_non_blank(&self, key: &str) -> Option<String> {
        let value = self.get_string(key, "");
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    }
}

/// The application embedding the module loader.
pub trait Host: Send + Sync {
    /// Host name, used as a log prefix.
    fn name(&self) -> &str;

    /// Root directory for host data; the module directory lives beneath it.
    fn data_directory(&self) -> &Path;

    /// Host configuration store.
    fn config(&self) -> &dyn HostConfig;

    /// Whether a host-level plugin a module depends on is enabled.
    fn is_host_plugin_enabled(&self, name: &str) -> bool {
        let _ = name;
        true
    }

    /// Background executor for work that must not block the caller.
    fn executor(&self) -> Arc<dyn TaskExecutor>;

    /// The host's serialized execution context.
    ///
    /// Work that mutates live module state (hot swaps) is submitted here.
    fn main_executor(&self) -> Arc<dyn TaskExecutor>;

    /// Logger for a module, prefixed with this host's name.
    fn module_logger(&self, module: &str) -> ModuleLogger {
        ModuleLogger::new(self.name(), module)
    }
}

/// In-memory [`HostConfig`].
#[derive(Debug, Default)]
pub struct MapConfig {
    values: RwLock<HashMap<String, String>>,
}

impl MapConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn set(&self, key: &str, value: impl Into<String>) {
        self.values.write().insert(key.to_string(), value.into());
    }

    pub fn remove(&self, key: &str) {
        self.values.write().remove(key);
    }
}

impl HostConfig for MapConfig {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.values
            .read()
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        match self.values.read().get(key).map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" => true,
            Some(v) if v == "false" => false,
            _ => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_config_defaults() {
        let config = MapConfig::new();
        assert_eq!(config.get_string("git.token", "fallback"), "fallback");
        assert!(config.get_bool("modules.check-updates", true));
        assert_eq!(config.get_non_blank("git.token"), None);
    }

    #[test]
    fn test_map_config_values() {
        let config = MapConfig::new()
            .with("git.token", "abc")
            .with("modules.check-updates", "FALSE")
            .with("blank", "   ");

        assert_eq!(config.get_string("git.token", ""), "abc");
        assert!(!config.get_bool("modules.check-updates", true));
        assert_eq!(config.get_non_blank("blank"), None);
        assert_eq!(config.get_non_blank("git.token"), Some("abc".to_string()));

        config.set("modules.check-updates", "not-a-bool");
        assert!(config.get_bool("modules.check-updates", true));

        config.remove("git.token");
        assert_eq!(config.get_non_blank("git.token"), None);
    }
}
