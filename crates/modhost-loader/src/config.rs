//! Loader configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use modhost_kernel::HostConfig;
use serde::{Deserialize, Serialize};

/// Configuration for a [`ModuleManager`](crate::ModuleManager).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    /// Module directory, relative to the host data directory unless absolute.
    pub modules_dir: PathBuf,
    /// Archive file extension, without the dot.
    pub archive_extension: String,
    /// Manifest file name inside each archive.
    pub manifest_name: String,
    /// Schedule release checks for modules declaring a remote source.
    /// Off unless the host opts in.
    pub check_updates: bool,
    pub github_api_url: String,
    /// Base for release download URLs built from a tag name.
    pub github_web_url: String,
    pub gitlab_api_url: String,
    pub http_timeout_secs: u64,
    pub user_agent: String,
    /// Where native libraries are extracted; `<modules_dir>/.native` when unset.
    pub native_cache_dir: Option<PathBuf>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            modules_dir: PathBuf::from("modules"),
            archive_extension: "zip".to_string(),
            manifest_name: "module.yml".to_string(),
            check_updates: false,
            github_api_url: "https://api.github.com".to_string(),
            github_web_url: "https://github.com".to_string(),
            gitlab_api_url: "https://gitlab.com/api/v4".to_string(),
            http_timeout_secs: 30,
            user_agent: "modhost-updater".to_string(),
            native_cache_dir: None,
        }
    }
}

impl ManagerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overlay the `modules.*`, `git.*` and `http.*` keys of a host configuration.
    pub fn from_host_config(config: &dyn HostConfig) -> Self {
        let mut cfg = Self::default();

        if let Some(dir) = config.get_non_blank("modules.directory") {
            cfg.modules_dir = PathBuf::from(dir);
        }
        if let Some(ext) = config.get_non_blank("modules.archive-extension") {
            cfg.archive_extension = ext.trim_start_matches('.').to_string();
        }
        cfg.check_updates = config.get_bool("modules.check-updates", cfg.check_updates);
        if let Some(url) = config.get_non_blank("git.github.api-url") {
            cfg.github_api_url = url;
        }
        if let Some(url) = config.get_non_blank("git.gitlab.api-url") {
            cfg.gitlab_api_url = url;
        }
        if let Some(secs) = config
            .get_non_blank("http.timeout-secs")
            .and_then(|s| s.trim().parse().ok())
        {
            cfg.http_timeout_secs = secs;
        }

        cfg
    }

    pub fn with_modules_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.modules_dir = dir.into();
        self
    }

    pub fn with_archive_extension(mut self, ext: impl Into<String>) -> Self {
        self.archive_extension = ext.into();
        self
    }

    pub fn with_check_updates(mut self, enabled: bool) -> Self {
        self.check_updates = enabled;
        self
    }

    pub fn with_github_urls(mut self, api: impl Into<String>, web: impl Into<String>) -> Self {
        self.github_api_url = api.into();
        self.github_web_url = web.into();
        self
    }

    pub fn with_gitlab_api_url(mut self, api: impl Into<String>) -> Self {
        self.gitlab_api_url = api.into();
        self
    }

    pub fn with_native_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.native_cache_dir = Some(dir.into());
        self
    }

    /// Resolve the module directory against the host data directory.
    pub fn resolve_modules_dir(&self, data_dir: &Path) -> PathBuf {
        if self.modules_dir.is_absolute() {
            self.modules_dir.clone()
        } else {
            data_dir.join(&self.modules_dir)
        }
    }

    pub fn resolve_native_cache_dir(&self, modules_dir: &Path) -> PathBuf {
        self.native_cache_dir
            .clone()
            .unwrap_or_else(|| modules_dir.join(".native"))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Whether a file name carries the archive extension.
    pub fn is_archive_name(&self, name: &str) -> bool {
        name.len() > self.archive_extension.len() + 1
            && name
                .to_ascii_lowercase()
                .ends_with(&format!(".{}", self.archive_extension.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modhost_kernel::MapConfig;

    #[test]
    fn test_defaults() {
        let cfg = ManagerConfig::default();
        assert_eq!(cfg.modules_dir, PathBuf::from("modules"));
        assert_eq!(cfg.archive_extension, "zip");
        assert_eq!(cfg.manifest_name, "module.yml");
        assert!(!cfg.check_updates);
        assert_eq!(cfg.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_host_config_overlay() {
        let host = MapConfig::new()
            .with("modules.directory", "/opt/mods")
            .with("modules.archive-extension", ".jar")
            .with("modules.check-updates", "true")
            .with("git.github.api-url", "http://localhost:9000")
            .with("http.timeout-secs", "5");

        let cfg = ManagerConfig::from_host_config(&host);
        assert_eq!(cfg.modules_dir, PathBuf::from("/opt/mods"));
        assert_eq!(cfg.archive_extension, "jar");
        assert!(cfg.check_updates);
        assert_eq!(cfg.github_api_url, "http://localhost:9000");
        assert_eq!(cfg.gitlab_api_url, "https://gitlab.com/api/v4");
        assert_eq!(cfg.http_timeout_secs, 5);
    }

    #[test]
    fn test_updates_stay_off_without_the_key() {
        let host = MapConfig::new().with("git.github.api-url", "http://localhost:9000");
        assert!(!ManagerConfig::from_host_config(&host).check_updates);
    }

    #[test]
    fn test_paths() {
        let cfg = ManagerConfig::default();
        let data = Path::new("/srv/host");
        let modules = cfg.resolve_modules_dir(data);
        assert_eq!(modules, PathBuf::from("/srv/host/modules"));
        assert_eq!(
            cfg.resolve_native_cache_dir(&modules),
            PathBuf::from("/srv/host/modules/.native")
        );

        let abs = cfg.with_modules_dir("/elsewhere");
        assert_eq!(abs.resolve_modules_dir(data), PathBuf::from("/elsewhere"));
    }

    #[test]
    fn test_archive_name() {
        let cfg = ManagerConfig::default();
        assert!(cfg.is_archive_name("shop.zip"));
        assert!(cfg.is_archive_name("Shop.ZIP"));
        assert!(!cfg.is_archive_name(".zip"));
        assert!(!cfg.is_archive_name("shop.zip.update"));
        assert!(!cfg.is_archive_name("shop.jar"));
    }
}
