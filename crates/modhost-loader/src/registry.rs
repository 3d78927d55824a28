//! Module registry
//!
//! The table of active modules and the table of their isolated contexts live
//! behind one lock so that an id is either present in both or in neither.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use modhost_kernel::Module;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::context::IsolatedContext;
use crate::descriptor::{ModuleDescriptor, RemoteSource};

/// An active module, owned by the registry.
pub struct RegisteredModule {
    pub id: String,
    pub version: String,
    pub instance: Box<dyn Module>,
    pub archive: PathBuf,
    pub remote: Option<RemoteSource>,
    pub loaded_at: DateTime<Utc>,
}

impl RegisteredModule {
    pub fn new(descriptor: &ModuleDescriptor, instance: Box<dyn Module>) -> Self {
        Self {
            id: descriptor.id.clone(),
            version: descriptor.version.clone(),
            instance,
            archive: descriptor.archive.clone(),
            remote: descriptor.remote.clone(),
            loaded_at: Utc::now(),
        }
    }

    pub fn info(&self) -> ModuleInfo {
        ModuleInfo {
            id: self.id.clone(),
            version: self.version.clone(),
            archive: self.archive.clone(),
            remote: self.remote.clone(),
            loaded_at: self.loaded_at,
        }
    }
}

impl fmt::Debug for RegisteredModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredModule")
            .field("id", &self.id)
            .field("version", &self.version)
            .field("archive", &self.archive)
            .field("remote", &self.remote)
            .field("loaded_at", &self.loaded_at)
            .finish_non_exhaustive()
    }
}

/// Snapshot of a registered module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    pub id: String,
    pub version: String,
    pub archive: PathBuf,
    pub remote: Option<RemoteSource>,
    pub loaded_at: DateTime<Utc>,
}

/// A module taken out of the registry together with its context.
#[derive(Debug)]
pub struct Detached {
    pub module: RegisteredModule,
    pub context: Option<IsolatedContext>,
}

#[derive(Default)]
struct Tables {
    modules: HashMap<String, RegisteredModule>,
    contexts: HashMap<String, IsolatedContext>,
}

/// Registry of active modules and their contexts.
#[derive(Default)]
pub struct ModuleRegistry {
    tables: RwLock<Tables>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tables.read().modules.contains_key(id)
    }

    /// The ids in `required` that are not registered, in order.
    pub fn missing(&self, required: &[String]) -> Vec<String> {
        let tables = self.tables.read();
        required
            .iter()
            .filter(|id| !tables.modules.contains_key(id.as_str()))
            .cloned()
            .collect()
    }

    /// Register a module with its context.
    ///
    /// Both are handed back when the id is already taken.
    pub fn insert(
        &self,
        module: RegisteredModule,
        context: IsolatedContext,
    ) -> Result<(), (RegisteredModule, IsolatedContext)> {
        let mut tables = self.tables.write();
        if tables.modules.contains_key(&module.id) {
            return Err((module, context));
        }
        tables.contexts.insert(module.id.clone(), context);
        tables.modules.insert(module.id.clone(), module);
        Ok(())
    }

    /// Take a module and its context out of the registry.
    pub fn remove(&self, id: &str) -> Option<Detached> {
        let mut tables = self.tables.write();
        let module = tables.modules.remove(id)?;
        let context = tables.contexts.remove(id);
        Some(Detached { module, context })
    }

    /// Drain any context left without a module.
    pub fn drain_contexts(&self) -> Vec<IsolatedContext> {
        let mut tables = self.tables.write();
        let Tables { modules, contexts } = &mut *tables;
        let orphans: Vec<String> = contexts
            .keys()
            .filter(|id| !modules.contains_key(id.as_str()))
            .cloned()
            .collect();
        orphans
            .iter()
            .filter_map(|id| contexts.remove(id))
            .collect()
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.read().modules.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn info(&self, id: &str) -> Option<ModuleInfo> {
        self.tables.read().modules.get(id).map(RegisteredModule::info)
    }

    /// Snapshots of every registered module, sorted by id.
    pub fn infos(&self) -> Vec<ModuleInfo> {
        let mut infos: Vec<ModuleInfo> = self
            .tables
            .read()
            .modules
            .values()
            .map(RegisteredModule::info)
            .collect();
        infos.sort_by(|a, b| a.id.cmp(&b.id));
        infos
    }

    /// id -> version
    pub fn versions(&self) -> BTreeMap<String, String> {
        self.tables
            .read()
            .modules
            .values()
            .map(|m| (m.id.clone(), m.version.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tables.read().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn context_count(&self) -> usize {
        self.tables.read().contexts.len()
    }
}

impl fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.ids())
            .finish()
    }
}
