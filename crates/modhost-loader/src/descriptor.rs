//! Module descriptor reader
//!
//! Decodes the manifest embedded in a module archive:
//!
//! ```yaml
//! name: shop                  # module id, required
//! main: acme::Shop            # entry point, required
//! version: 1.4.0              # optional, defaults to 1.0.0
//! depend: [economy-core]      # optional, host plugins that must be enabled
//! extension:
//!   depend: [wallet]          # optional, module ids that must be loaded first
//! git:                        # optional; ignored unless all three are set
//!   provider: github
//!   owner: acme
//!   repository: shop
//! ```

use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use tracing::warn;

use crate::error::{LoadError, UpdateError};

/// Version assumed when a manifest omits one.
pub const DEFAULT_VERSION: &str = "1.0.0";

/// Release hosting service a module publishes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    GitLab,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::GitLab => "gitlab",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "github" => Ok(Provider::GitHub),
            "gitlab" => Ok(Provider::GitLab),
            other => Err(UpdateError::UnsupportedProvider(other.to_string())),
        }
    }
}

/// Where a module's releases are published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSource {
    pub provider: Provider,
    pub owner: String,
    pub repository: String,
}

impl RemoteSource {
    /// `owner/repository`
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.repository)
    }
}

/// Metadata decoded from a module's manifest.
#[derive(Debug, Clone)]
pub struct ModuleDescriptor {
    pub id: String,
    pub entry_point: String,
    pub version: String,
    /// Module ids that must be registered before this one activates.
    pub required_modules: Vec<String>,
    /// Host plugins that must be enabled.
    pub host_plugins: Vec<String>,
    pub remote: Option<RemoteSource>,
    pub archive: PathBuf,
}

/// Read and decode the manifest of an archive.
pub fn read_descriptor(archive: &Path, manifest_name: &str) -> Result<ModuleDescriptor, LoadError> {
    let malformed = |reason: String| LoadError::MalformedDescriptor {
        archive: archive.to_path_buf(),
        reason,
    };

    let file = File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| malformed(e.to_string()))?;
    let mut content = String::new();
    {
        let mut entry = zip
            .by_name(manifest_name)
            .map_err(|_| malformed(format!("missing {manifest_name}")))?;
        entry
            .read_to_string(&mut content)
            .map_err(|e| malformed(e.to_string()))?;
    }

    parse_descriptor(&content, archive).map_err(malformed)
}

/// Decode manifest text. The error is a human-readable reason.
pub fn parse_descriptor(content: &str, archive: &Path) -> Result<ModuleDescriptor, String> {
    let doc: Value = serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    if !doc.is_mapping() {
        return Err("manifest is not a mapping".to_string());
    }

    let id = scalar(&doc["name"]).ok_or("missing name")?;
    let entry_point = scalar(&doc["main"]).ok_or("missing main")?;
    let version = scalar(&doc["version"]).unwrap_or_else(|| DEFAULT_VERSION.to_string());

    Ok(ModuleDescriptor {
        remote: remote_source(&doc["git"], &id),
        required_modules: string_list(&doc["extension"]["depend"]),
        host_plugins: string_list(&doc["depend"]),
        id,
        entry_point,
        version,
        archive: archive.to_path_buf(),
    })
}

/// A non-blank scalar rendered as a string.
fn scalar(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        other => scalar(other).into_iter().collect(),
    }
}

fn remote_source(value: &Value, id: &str) -> Option<RemoteSource> {
    let provider = scalar(&value["provider"])?;
    let owner = scalar(&value["owner"])?;
    let repository = scalar(&value["repository"])?;

    match provider.parse() {
        Ok(provider) => Some(RemoteSource {
            provider,
            owner,
            repository,
        }),
        Err(e) => {
            warn!("Ignoring remote source of module {}: {}", id, e);
            None
        }
    }
}
