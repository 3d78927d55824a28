//! modhost kernel
//!
//! The contract shared by the module loader and the modules it loads:
//! - [`Module`] lifecycle trait and the [`ModuleRegistrar`] constructor table
//! - [`Host`] / [`HostConfig`] seams implemented by the embedding application
//! - [`TaskExecutor`] abstraction with tokio-backed implementations
//! - [`FileConfig`](config::FileConfig) file-backed host configuration

// module contract
pub mod module;
pub use module::*;

// host seams
pub mod host;
pub use host::{Host, HostConfig, MapConfig};

// task execution
pub mod executor;
pub use executor::{SerialExecutor, Task, TaskExecutor, TokioExecutor};

// configuration files
pub mod config;

// per-module logging
pub mod logging;
pub use logging::ModuleLogger;
