//! Command implementations

pub mod check_updates;
pub mod finalize;
pub mod list;
pub mod run;

use std::sync::Arc;

use modhost_kernel::{Host, ModuleRegistrar};
use modhost_loader::{ManagerConfig, ModuleManager};

use crate::error::CliError;
use crate::host::CliHost;

/// Manager for the CLI host.
///
/// The CLI links no modules statically, so every entry point must come from
/// a native library shipped in the module's archive.
pub fn manager(host: Arc<CliHost>) -> Result<ModuleManager, CliError> {
    let host: Arc<dyn Host> = host;
    Ok(ModuleManager::from_host(host, ModuleRegistrar::new())?)
}

/// Manager that never schedules background update checks, for commands that
/// exit right after loading or drive updates themselves.
pub fn inline_manager(host: Arc<CliHost>) -> Result<ModuleManager, CliError> {
    let host: Arc<dyn Host> = host;
    let config = ManagerConfig::from_host_config(host.config()).with_check_updates(false);
    Ok(ModuleManager::new(host, ModuleRegistrar::new(), config)?)
}
