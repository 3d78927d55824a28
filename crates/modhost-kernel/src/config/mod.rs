//! File-backed host configuration
//!
//! [`FileConfig`] implements [`HostConfig`] over the `config` crate so a host
//! can keep its settings in any of the common formats:
//!
//! - YAML: `.yaml`, `.yml`
//! - TOML: `.toml`
//! - JSON: `.json`
//! - INI: `.ini`
//! - RON: `.ron`
//! - JSON5: `.json5`
//!
//! `${VAR}` and `$VAR` references are replaced with environment values before
//! parsing. Nested keys are addressed with dots (`git.github.token`).

use std::path::Path;
use std::sync::LazyLock;

use config::{Config as Cfg, Environment, File, FileFormat};
use regex::Regex;

use crate::host::HostConfig;

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parsing error: {0}")]
    Parse(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

static BRACED_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("braced env pattern is valid")
});

static SIMPLE_VAR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)\b").expect("simple env pattern is valid")
});

/// Detect configuration format from file extension
pub fn detect_format(path: &Path) -> ConfigResult<FileFormat> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| ConfigError::UnsupportedFormat("No file extension found".to_string()))?;

    match ext.to_lowercase().as_str() {
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "toml" => Ok(FileFormat::Toml),
        "json" => Ok(FileFormat::Json),
        "ini" => Ok(FileFormat::Ini),
        "ron" => Ok(FileFormat::Ron),
        "json5" => Ok(FileFormat::Json5),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

/// Substitute environment variables in a string
///
/// `${VAR_NAME}` is replaced first, then bare `$VAR_NAME`. Unknown variables
/// are left untouched.
pub fn substitute_env_vars(content: &str) -> String {
    let braced = BRACED_VAR.replace_all(content, |caps: &regex::Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    });

    SIMPLE_VAR
        .replace_all(&braced, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned()
}

/// Host configuration loaded from a file.
#[derive(Debug, Clone)]
pub struct FileConfig {
    inner: Cfg,
}

impl FileConfig {
    /// A configuration with no keys; every lookup yields its default.
    pub fn empty() -> Self {
        Self {
            inner: Cfg::default(),
        }
    }

    /// Load a configuration file, detecting the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content, format)
    }

    /// Load a configuration file with environment overrides.
    ///
    /// Variables are prefixed with `env_prefix` and use `__` for nesting, so
    /// `MODHOST_GIT__TOKEN` overrides `git.token`.
    pub fn load_with_env(path: impl AsRef<Path>, env_prefix: &str) -> ConfigResult<Self> {
        let path = path.as_ref();
        let format = detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        let substituted = substitute_env_vars(&content);

        let inner = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .add_source(Environment::with_prefix(env_prefix).separator("__"))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(Self { inner })
    }

    /// Parse configuration content in an explicit format.
    pub fn from_str(content: &str, format: FileFormat) -> ConfigResult<Self> {
        let substituted = substitute_env_vars(content);

        let inner = Cfg::builder()
            .add_source(File::from_str(&substituted, format))
            .build()
            .map_err(|e| ConfigError::Parse(e.to_string()))?;

        Ok(Self { inner })
    }
}

impl Default for FileConfig {
    fn default() -> Self {
        Self::empty()
    }
}

impl HostConfig for FileConfig {
    fn get_string(&self, key: &str, default: &str) -> String {
        self.inner
            .get_string(key)
            .unwrap_or_else(|_| default.to_string())
    }

    fn get_bool(&self, key: &str, default: bool) -> bool {
        self.inner.get_bool(key).unwrap_or(default)
    }
}
