//! Module contract
//!
//! The [`Module`] lifecycle trait, the [`ModuleRegistrar`] constructor table
//! and the exported-symbol ABI a native module library implements through
//! [`declare_module!`](crate::declare_module).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::executor::TaskExecutor;
use crate::host::Host;

pub mod error;
pub use error::ModuleError;

/// Module hook result type using the typed [`ModuleError`].
pub type ModuleResult<T> = Result<T, ModuleError>;

// ============================================================================
// Module contract
// ============================================================================

/// Contract implemented by every loadable module.
///
/// A module is constructed with no arguments through a constructor registered
/// under its entry-point name, passes the license gate, and is then activated.
/// Deactivation is always followed by the teardown of the module's isolated
/// context, so a module must release everything it acquired in `activate`.
#[async_trait::async_trait]
pub trait Module: Send + Sync {
    /// Called once after construction and a successful license check.
    ///
    /// An error here aborts the load: the module never becomes visible to
    /// other callers and its context is closed.
    async fn activate(
        &mut self,
        host: Arc<dyn Host>,
        executor: Arc<dyn TaskExecutor>,
    ) -> ModuleResult<()> {
        let _ = (host, executor);
        Ok(())
    }

    /// Called when the module is disabled, reloaded or replaced.
    ///
    /// Failures are logged by the loader and never prevent teardown.
    async fn deactivate(
        &mut self,
        host: Arc<dyn Host>,
        executor: Arc<dyn TaskExecutor>,
    ) -> ModuleResult<()> {
        let _ = (host, executor);
        Ok(())
    }

    /// Module-defined update probe against an arbitrary endpoint.
    fn check_for_remote_update(&self, url: &str, token: &str) -> bool {
        let _ = (url, token);
        false
    }

    /// Entitlement check run before activation.
    ///
    /// `url` and `token` come from the module's host-side `config.yml`
    /// (`license.url` / `license.token`) and are empty strings when absent.
    fn check_license(&self, url: &str, token: &str) -> bool {
        let _ = (url, token);
        true
    }
}

// ============================================================================
// Constructor table
// ============================================================================

/// Zero-argument constructor for a module entry point.
pub type ModuleConstructor = Arc<dyn Fn() -> ModuleResult<Box<dyn Module>> + Send + Sync>;

/// Table of named module constructors.
///
/// The host fills one with its statically linked modules; a native module
/// library fills its own through the `_module_register` export generated by
/// [`declare_module!`](crate::declare_module).
#[derive(Clone, Default)]
pub struct ModuleRegistrar {
    constructors: HashMap<String, ModuleConstructor>,
}

impl ModuleRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a constructor under an entry-point name, replacing any
    /// previous registration of that name.
    pub fn register<F>(&mut self, entry_point: impl Into<String>, constructor: F)
    where
        F: Fn() -> ModuleResult<Box<dyn Module>> + Send + Sync + 'static,
    {
        self.constructors
            .insert(entry_point.into(), Arc::new(constructor));
    }

    /// Register a `Default`-constructible module type.
    pub fn register_default<M>(&mut self, entry_point: impl Into<String>)
    where
        M: Module + Default + 'static,
    {
        self.register(entry_point, || Ok(Box::new(M::default()) as Box<dyn Module>));
    }

    /// Builder form of [`register`](Self::register).
    pub fn with<F>(mut self, entry_point: impl Into<String>, constructor: F) -> Self
    where
        F: Fn() -> ModuleResult<Box<dyn Module>> + Send + Sync + 'static,
    {
        self.register(entry_point, constructor);
        self
    }

    /// Look up a constructor by entry-point name.
    pub fn get(&self, entry_point: &str) -> Option<ModuleConstructor> {
        self.constructors.get(entry_point).cloned()
    }

    pub fn contains(&self, entry_point: &str) -> bool {
        self.constructors.contains_key(entry_point)
    }

    /// Registered entry-point names, sorted.
    pub fn entry_points(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.constructors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constructors.is_empty()
    }

    /// Drop every registered constructor.
    pub fn clear(&mut self) {
        self.constructors.clear();
    }
}

impl fmt::Debug for ModuleRegistrar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistrar")
            .field("entry_points", &self.entry_points())
            .finish()
    }
}

// ============================================================================
// Native library ABI
// ============================================================================

/// ABI version a native module library must report.
pub const MODULE_API_VERSION: u32 = 1;

/// Exported symbol returning the library's ABI version.
pub const MODULE_API_VERSION_SYMBOL: &[u8] = b"_module_api_version";

/// Exported symbol that fills a [`ModuleRegistrar`] with the library's modules.
pub const MODULE_REGISTER_SYMBOL: &[u8] = b"_module_register";

/// Signature of [`MODULE_API_VERSION_SYMBOL`].
pub type ModuleApiVersionFn = unsafe extern "C" fn() -> u32;

/// Signature of [`MODULE_REGISTER_SYMBOL`].
#[allow(improper_ctypes_definitions)]
pub type ModuleRegisterFn = unsafe extern "C" fn(&mut ModuleRegistrar);

/// Export the native entry points for a module library.
///
/// ```rust,ignore
/// modhost_kernel::declare_module! {
///     "acme::Greeter" => Greeter,
///     "acme::Scoreboard" => Scoreboard,
/// }
/// ```
///
/// Every listed type must implement [`Module`] and `Default`.
#[macro_export]
macro_rules! declare_module {
    ($($entry:expr => $module:ty),+ $(,)?) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn _module_api_version() -> u32 {
            $crate::module::MODULE_API_VERSION
        }

        #[unsafe(no_mangle)]
        #[allow(improper_ctypes_definitions)]
        pub extern "C" fn _module_register(registrar: &mut $crate::module::ModuleRegistrar) {
            $(
                registrar.register_default::<$module>($entry);
            )+
        }
    };
}
