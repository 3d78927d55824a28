//! Release-based module updates
//!
//! A module whose manifest names a remote source goes through
//!
//! ```text
//! CHECK -> (up to date) done
//!       -> DOWNLOAD -> (failed) done
//!                   -> SWAP + RELOAD on the host's serialized executor
//! ```
//!
//! [`UpdatePipeline`] covers CHECK and DOWNLOAD. The swap lives in
//! [`ModuleManager::swap_and_reload`](crate::ModuleManager::swap_and_reload)
//! because it mutates the registry.

use std::path::PathBuf;
use std::sync::Arc;

use modhost_kernel::Host;
use tracing::{debug, info};

use crate::config::ManagerConfig;
use crate::descriptor::RemoteSource;
use crate::error::UpdateError;
use crate::finalizer::{staged_path, temp_path};
use crate::registry::ModuleInfo;
use crate::version::is_newer_release;

pub mod http;
pub mod provider;
pub mod token;

pub use http::UpdateClient;
pub use provider::Release;

/// How an update cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The module declares no remote source.
    NoRemoteSource,
    UpToDate { version: String },
    Applied { from: String, to: String },
    /// Another cycle for the module had not finished; nothing was done.
    InProgress,
}

/// CHECK and DOWNLOAD stages.
pub struct UpdatePipeline {
    client: UpdateClient,
    config: ManagerConfig,
    host: Arc<dyn Host>,
}

impl UpdatePipeline {
    pub fn new(config: ManagerConfig, host: Arc<dyn Host>) -> Result<Self, UpdateError> {
        Ok(Self {
            client: UpdateClient::new(&config)?,
            config,
            host,
        })
    }

    fn auth(&self, source: &RemoteSource) -> Option<http::AuthHeader> {
        token::resolve_token(source.provider, self.host.config())
            .map(|t| provider::auth_header(source.provider, &t))
    }

    /// Fetch the latest release of a module's repository.
    pub async fn latest_release(&self, source: &RemoteSource) -> Result<Option<Release>, UpdateError> {
        let url = provider::release_url(source, &self.config);
        debug!("Checking {} for releases of {}", url, source.slug());
        let body = self.client.get_text(&url, self.auth(source).as_ref()).await?;
        Ok(provider::parse_release(
            source,
            &body,
            &self.config.archive_extension,
            &self.config,
        ))
    }

    /// CHECK: the latest release, if it is newer than the loaded version.
    pub async fn check(&self, module: &ModuleInfo) -> Result<Option<Release>, UpdateError> {
        let Some(source) = &module.remote else {
            return Ok(None);
        };

        let release = self
            .latest_release(source)
            .await?
            .filter(|r| is_newer_release(&r.tag, &module.version));
        match &release {
            Some(r) => info!(
                "Update available for module {}: {} -> {}",
                module.id, module.version, r.tag
            ),
            None => debug!("Module {} is up to date (v{})", module.id, module.version),
        }
        Ok(release)
    }

    /// DOWNLOAD: stage the release asset beside the module's archive.
    ///
    /// Returns the path of the staged `.update` file.
    pub async fn download(&self, module: &ModuleInfo, release: &Release) -> Result<PathBuf, UpdateError> {
        let source = module
            .remote
            .as_ref()
            .ok_or_else(|| UpdateError::UnsupportedProvider("none".to_string()))?;
        let url = release.asset_url.as_deref().ok_or_else(|| UpdateError::NoAsset {
            repository: source.slug(),
            extension: self.config.archive_extension.clone(),
        })?;

        let staged = staged_path(&module.archive);
        let bytes = self
            .client
            .download(
                url,
                self.auth(source).as_ref(),
                &temp_path(&module.archive),
                &staged,
            )
            .await?;
        info!(
            "Downloaded {} ({} bytes) for module {}",
            release.tag, bytes, module.id
        );
        Ok(staged)
    }
}
