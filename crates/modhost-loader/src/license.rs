//! License gate
//!
//! Before activation a module is asked whether it is entitled to run. The
//! URL and token it checks against come from a host-side document at
//! `<modules-dir>/<module id>/config.yml`:
//!
//! ```yaml
//! license:
//!   url: https://license.example.com/verify
//!   token: abc123
//! ```

use std::path::{Path, PathBuf};

use modhost_kernel::Module;
use serde::Deserialize;
use tracing::warn;

/// Per-module configuration document name.
pub const MODULE_CONFIG_FILE: &str = "config.yml";

/// License fields; empty when not configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LicenseConfig {
    pub url: String,
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ModuleConfigDocument {
    license: LicenseConfig,
}

pub fn module_config_path(modules_dir: &Path, id: &str) -> PathBuf {
    modules_dir.join(id).join(MODULE_CONFIG_FILE)
}

/// Read the license fields for a module. A missing or unreadable document
/// yields empty fields.
pub fn read_license_config(modules_dir: &Path, id: &str) -> LicenseConfig {
    let path = module_config_path(modules_dir, id);
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return LicenseConfig::default(),
        Err(e) => {
            warn!("Failed to read {:?}: {}", path, e);
            return LicenseConfig::default();
        }
    };
    if content.trim().is_empty() {
        return LicenseConfig::default();
    }

    match serde_yaml::from_str::<ModuleConfigDocument>(&content) {
        Ok(doc) => doc.license,
        Err(e) => {
            warn!("Ignoring malformed {:?}: {}", path, e);
            LicenseConfig::default()
        }
    }
}

/// Run the module's license check against its configured URL and token.
pub fn check_license(instance: &dyn Module, modules_dir: &Path, id: &str) -> bool {
    let license = read_license_config(modules_dir, id);
    instance.check_license(&license.url, &license.token)
}
