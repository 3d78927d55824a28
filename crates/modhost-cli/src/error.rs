use std::path::PathBuf;

use modhost_kernel::config::ConfigError;
use modhost_loader::ManagerError;

#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Configuration error in {path:?}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },

    #[error("Data directory {0:?} does not exist")]
    MissingDataDir(PathBuf),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Module manager error: {0}")]
    Manager(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<error_stack::Report<ManagerError>> for CliError {
    fn from(report: error_stack::Report<ManagerError>) -> Self {
        CliError::Manager(format!("{report:?}"))
    }
}
