//! The CLI as a module host

use std::path::{Path, PathBuf};
use std::sync::Arc;

use modhost_kernel::config::FileConfig;
use modhost_kernel::{Host, HostConfig, SerialExecutor, TaskExecutor, TokioExecutor};
use tokio::runtime::Handle;

use crate::error::CliError;

/// Configuration file looked up in the data directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "modhost.yml";

/// Prefix for environment overrides of configuration keys.
pub const ENV_PREFIX: &str = "MODHOST";

pub struct CliHost {
    data_dir: PathBuf,
    config: FileConfig,
    background: Arc<TokioExecutor>,
    main: Arc<SerialExecutor>,
}

impl CliHost {
    pub fn new(data_dir: &Path, config_path: Option<&Path>, handle: &Handle) -> Result<Self, CliError> {
        if !data_dir.is_dir() {
            return Err(CliError::MissingDataDir(data_dir.to_path_buf()));
        }

        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            config: load_config(data_dir, config_path)?,
            background: Arc::new(TokioExecutor::new(handle.clone())),
            main: Arc::new(SerialExecutor::spawn(handle)),
        })
    }

    /// Wait for swaps already queued on the serialized executor.
    pub async fn flush(&self) {
        self.main.flush().await;
    }
}

fn load_config(data_dir: &Path, explicit: Option<&Path>) -> Result<FileConfig, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let default = data_dir.join(DEFAULT_CONFIG_FILE);
            if !default.is_file() {
                tracing::debug!("No configuration file at {:?}; using defaults", default);
                return Ok(FileConfig::empty());
            }
            default
        }
    };

    FileConfig::load_with_env(&path, ENV_PREFIX).map_err(|source| CliError::Config { path, source })
}

impl Host for CliHost {
    fn name(&self) -> &str {
        "modhost"
    }

    fn data_directory(&self) -> &Path {
        &self.data_dir
    }

    fn config(&self) -> &dyn HostConfig {
        &self.config
    }

    fn executor(&self) -> Arc<dyn TaskExecutor> {
        self.background.clone()
    }

    fn main_executor(&self) -> Arc<dyn TaskExecutor> {
        self.main.clone()
    }
}
