//! Shared fixtures for the `modhost-loader` integration tests.
//!
//! Declared with `mod common;` in each test file that needs it.

use std::collections::HashSet;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use modhost_kernel::{
    Host, HostConfig, MapConfig, Module, ModuleError, ModuleRegistrar, ModuleResult,
    SerialExecutor, TaskExecutor, TokioExecutor,
};
use modhost_loader::{ManagerConfig, ModuleManager};
use parking_lot::Mutex;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

// ============================================================================
// Host
// ============================================================================

pub struct TestHost {
    dir: TempDir,
    pub config: MapConfig,
    disabled_plugins: Mutex<HashSet<String>>,
    background: Arc<TokioExecutor>,
    main: Arc<SerialExecutor>,
}

impl TestHost {
    /// Must be called inside a tokio runtime.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            dir: tempfile::tempdir().expect("tempdir"),
            config: MapConfig::new(),
            disabled_plugins: Mutex::new(HashSet::new()),
            background: Arc::new(TokioExecutor::current().expect("runtime")),
            main: Arc::new(SerialExecutor::spawn_current().expect("runtime")),
        })
    }

    pub fn modules_dir(&self) -> PathBuf {
        self.dir.path().join("modules")
    }

    pub fn disable_plugin(&self, name: &str) {
        self.disabled_plugins.lock().insert(name.to_string());
    }

    pub fn serial(&self) -> &SerialExecutor {
        &self.main
    }
}

impl Host for TestHost {
    fn name(&self) -> &str {
        "test-host"
    }

    fn data_directory(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> &dyn HostConfig {
        &self.config
    }

    fn is_host_plugin_enabled(&self, name: &str) -> bool {
        !self.disabled_plugins.lock().contains(name)
    }

    fn executor(&self) -> Arc<dyn TaskExecutor> {
        self.background.clone()
    }

    fn main_executor(&self) -> Arc<dyn TaskExecutor> {
        self.main.clone()
    }
}

// ============================================================================
// Archives
// ============================================================================

/// Manifest text for a module.
pub fn manifest(id: &str, main: &str, version: &str, depends: &[&str]) -> String {
    let mut yaml = format!("name: {id}\nmain: {main}\nversion: {version}\n");
    if !depends.is_empty() {
        yaml.push_str(&format!("extension:\n  depend: [{}]\n", depends.join(", ")));
    }
    yaml
}

/// Write an archive holding `module.yml` plus extra entries.
pub fn write_archive(path: &Path, manifest: Option<&str>, extra: &[(&str, &str)]) {
    std::fs::create_dir_all(path.parent().expect("parent")).expect("create dir");
    let mut zip = zip::ZipWriter::new(File::create(path).expect("create archive"));
    if let Some(manifest) = manifest {
        zip.start_file("module.yml", SimpleFileOptions::default())
            .expect("start manifest");
        zip.write_all(manifest.as_bytes()).expect("write manifest");
    }
    for (name, content) in extra {
        zip.start_file(*name, SimpleFileOptions::default())
            .expect("start entry");
        zip.write_all(content.as_bytes()).expect("write entry");
    }
    zip.finish().expect("finish archive");
}

/// Write `<modules>/<file>` with the given manifest.
pub fn write_module(host: &TestHost, file: &str, manifest: &str) -> PathBuf {
    let path = host.modules_dir().join(file);
    write_archive(&path, Some(manifest), &[]);
    path
}

/// Archive bytes for a manifest, for serving from a mock server.
pub fn archive_bytes(manifest: &str) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("asset.zip");
    write_archive(&path, Some(manifest), &[]);
    std::fs::read(path).expect("read archive")
}

// ============================================================================
// Modules
// ============================================================================

/// Shared record of lifecycle calls, as `"<event>:<entry point>"`.
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<String>>>);

impl EventLog {
    pub fn push(&self, event: String) {
        self.0.lock().push(event);
    }

    pub fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().iter().filter(|e| e.as_str() == event).count()
    }
}

pub struct Recorder {
    name: String,
    log: EventLog,
}

#[async_trait]
impl Module for Recorder {
    async fn activate(
        &mut self,
        host: Arc<dyn Host>,
        _executor: Arc<dyn TaskExecutor>,
    ) -> ModuleResult<()> {
        host.module_logger(&self.name).info("activated");
        self.log.push(format!("activate:{}", self.name));
        Ok(())
    }

    async fn deactivate(
        &mut self,
        _host: Arc<dyn Host>,
        _executor: Arc<dyn TaskExecutor>,
    ) -> ModuleResult<()> {
        self.log.push(format!("deactivate:{}", self.name));
        Ok(())
    }
}

struct FailingActivation {
    panic: bool,
}

#[async_trait]
impl Module for FailingActivation {
    async fn activate(
        &mut self,
        _host: Arc<dyn Host>,
        _executor: Arc<dyn TaskExecutor>,
    ) -> ModuleResult<()> {
        if self.panic {
            panic!("activation exploded");
        }
        Err(ModuleError::ActivationFailed("database unreachable".to_string()))
    }
}

struct LicenseGated;

#[async_trait]
impl Module for LicenseGated {
    fn check_license(&self, _url: &str, token: &str) -> bool {
        token == "valid-token"
    }
}

/// Registrar with a recorder under each entry point plus the failure fixtures:
///
/// - `test::FailActivate` / `test::PanicActivate`
/// - `test::FailConstruct` / `test::PanicConstruct`
/// - `test::Licensed` (accepts token `valid-token`)
pub fn registrar(entries: &[&str], log: &EventLog) -> ModuleRegistrar {
    let mut registrar = ModuleRegistrar::new();
    for entry in entries {
        let name = entry.to_string();
        let log = log.clone();
        registrar.register(*entry, move || {
            Ok(Box::new(Recorder {
                name: name.clone(),
                log: log.clone(),
            }) as Box<dyn Module>)
        });
    }
    registrar
        .with("test::FailActivate", || {
            Ok(Box::new(FailingActivation { panic: false }) as Box<dyn Module>)
        })
        .with("test::PanicActivate", || {
            Ok(Box::new(FailingActivation { panic: true }) as Box<dyn Module>)
        })
        .with("test::FailConstruct", || {
            Err(ModuleError::ConstructionFailed("missing settings".to_string()))
        })
        .with("test::PanicConstruct", || panic!("constructor exploded"))
        .with("test::Licensed", || Ok(Box::new(LicenseGated) as Box<dyn Module>))
}

/// Manager over the host's module directory with update checks off.
pub fn manager(host: &Arc<TestHost>, registrar: ModuleRegistrar) -> ModuleManager {
    manager_with(host, registrar, ManagerConfig::default().with_check_updates(false))
}

pub fn manager_with(
    host: &Arc<TestHost>,
    registrar: ModuleRegistrar,
    config: ManagerConfig,
) -> ModuleManager {
    let host: Arc<dyn Host> = host.clone();
    ModuleManager::new(host, registrar, config).expect("manager")
}
