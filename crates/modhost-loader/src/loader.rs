//! Single-module activation
//!
//! [`ModuleLoader::load`] takes one archive from manifest to registry entry.
//! Nothing is registered until the activation hook has returned successfully,
//! and every failure after the context is opened closes it before returning.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::FutureExt;
use modhost_kernel::{Host, Module};
use tracing::{debug, error, info};

use crate::context::{ContextOptions, ContextTracker, IsolatedContext};
use crate::descriptor::{ModuleDescriptor, read_descriptor};
use crate::error::LoadError;
use crate::license;
use crate::registry::{ModuleInfo, ModuleRegistry, RegisteredModule};

/// Result of one load attempt.
#[derive(Debug)]
pub enum LoadOutcome {
    /// Activated and registered.
    Loaded(ModuleInfo),
    /// Required modules are not registered yet; nothing was touched.
    Waiting { id: String, missing: Vec<String> },
    /// Permanent failure for this run.
    Failed(LoadError),
}

impl LoadOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadOutcome::Loaded(_))
    }
}

/// Loads archives into a shared [`ModuleRegistry`].
pub struct ModuleLoader {
    host: Arc<dyn Host>,
    registry: Arc<ModuleRegistry>,
    context_options: ContextOptions,
    modules_dir: PathBuf,
    manifest_name: String,
}

impl ModuleLoader {
    pub fn new(
        host: Arc<dyn Host>,
        registry: Arc<ModuleRegistry>,
        context_options: ContextOptions,
        modules_dir: impl Into<PathBuf>,
        manifest_name: impl Into<String>,
    ) -> Self {
        Self {
            host,
            registry,
            context_options,
            modules_dir: modules_dir.into(),
            manifest_name: manifest_name.into(),
        }
    }

    pub fn registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn tracker(&self) -> &ContextTracker {
        &self.context_options.tracker
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn modules_dir(&self) -> &Path {
        &self.modules_dir
    }

    pub fn manifest_name(&self) -> &str {
        &self.manifest_name
    }

    /// Attempt to activate the module in `archive`.
    ///
    /// Callers must serialize loads against every other registry mutation.
    pub async fn load(&self, archive: &Path) -> LoadOutcome {
        match self.try_load(archive).await {
            Ok(info) => {
                info!("Loaded module {} v{}", info.id, info.version);
                LoadOutcome::Loaded(info)
            }
            Err(LoadError::UnsatisfiedDependency { id, missing }) => {
                debug!("Module {} waiting for {:?}", id, missing);
                LoadOutcome::Waiting { id, missing }
            }
            Err(e) => {
                error!("Failed to load {:?}: {}", archive, e);
                LoadOutcome::Failed(e)
            }
        }
    }

    async fn try_load(&self, archive: &Path) -> Result<ModuleInfo, LoadError> {
        let descriptor = read_descriptor(archive, &self.manifest_name)?;
        self.check_preconditions(&descriptor)?;

        let context = IsolatedContext::open(archive, &self.context_options)?;
        let instance = match self.instantiate(&descriptor, &context) {
            Ok(instance) => instance,
            Err(e) => {
                discard(None, context);
                return Err(e);
            }
        };

        let id = descriptor.id.clone();
        let modules_dir = self.modules_dir.clone();
        let licensed = catch_unwind(AssertUnwindSafe(|| {
            license::check_license(instance.as_ref(), &modules_dir, &id)
        }))
        .unwrap_or(false);
        if !licensed {
            discard(Some(instance), context);
            return Err(LoadError::LicenseRejected(descriptor.id));
        }

        let mut instance = instance;
        let activation = AssertUnwindSafe(instance.activate(self.host.clone(), self.host.executor()))
            .catch_unwind()
            .await;
        let failure = match activation {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
        };
        if let Some(reason) = failure {
            discard(Some(instance), context);
            return Err(LoadError::Activation {
                id: descriptor.id,
                reason,
            });
        }

        let module = RegisteredModule::new(&descriptor, instance);
        let info = module.info();
        if let Err((mut module, context)) = self.registry.insert(module, context) {
            // lost a race with a concurrent load of the same id
            let _ = module
                .instance
                .deactivate(self.host.clone(), self.host.executor())
                .await;
            discard(Some(module.instance), context);
            return Err(LoadError::DuplicateId(descriptor.id));
        }

        Ok(info)
    }

    /// Checks that need neither a context nor an instance.
    fn check_preconditions(&self, descriptor: &ModuleDescriptor) -> Result<(), LoadError> {
        if let Some(plugin) = descriptor
            .host_plugins
            .iter()
            .find(|p| !self.host.is_host_plugin_enabled(p))
        {
            return Err(LoadError::MissingHostPlugin {
                id: descriptor.id.clone(),
                plugin: plugin.clone(),
            });
        }

        let missing = self.registry.missing(&descriptor.required_modules);
        if !missing.is_empty() {
            return Err(LoadError::UnsatisfiedDependency {
                id: descriptor.id.clone(),
                missing,
            });
        }

        if self.registry.contains(&descriptor.id) {
            return Err(LoadError::DuplicateId(descriptor.id.clone()));
        }

        Ok(())
    }

    fn instantiate(
        &self,
        descriptor: &ModuleDescriptor,
        context: &IsolatedContext,
    ) -> Result<Box<dyn Module>, LoadError> {
        let constructor =
            context
                .resolve(&descriptor.entry_point)
                .ok_or_else(|| LoadError::ContractViolation {
                    id: descriptor.id.clone(),
                    entry_point: descriptor.entry_point.clone(),
                })?;

        let reason = match catch_unwind(AssertUnwindSafe(|| constructor())) {
            Ok(Ok(instance)) => return Ok(instance),
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };
        Err(LoadError::Instantiation {
            id: descriptor.id.clone(),
            reason,
        })
    }
}

/// Drop an instance, then close the context its code came from.
pub(crate) fn discard(instance: Option<Box<dyn Module>>, mut context: IsolatedContext) {
    drop(instance);
    context.close();
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(payload.as_ref()), "static");

        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(payload.as_ref()), "owned");

        let payload: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic payload");
    }
}
