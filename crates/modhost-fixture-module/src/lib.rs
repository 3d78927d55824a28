//! Native module library for the loader's isolation tests.
//!
//! Built twice, with and without the `beta` feature, so that two archives
//! can register the same entry point with different code behind it. On
//! activation the module leaves `greeter-<flavor>.activated` in the host
//! data directory.

use std::sync::Arc;

use async_trait::async_trait;
use modhost_kernel::{Host, Module, ModuleResult, TaskExecutor};

#[cfg(not(feature = "beta"))]
const FLAVOR: &str = "alpha";
#[cfg(feature = "beta")]
const FLAVOR: &str = "beta";

#[derive(Default)]
pub struct Greeter;

#[async_trait]
impl Module for Greeter {
    async fn activate(
        &mut self,
        host: Arc<dyn Host>,
        _executor: Arc<dyn TaskExecutor>,
    ) -> ModuleResult<()> {
        let marker = host
            .data_directory()
            .join(format!("greeter-{FLAVOR}.activated"));
        std::fs::write(marker, FLAVOR)?;
        Ok(())
    }
}

modhost_kernel::declare_module! {
    "fixture::Greeter" => Greeter,
}
