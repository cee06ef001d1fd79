// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Catalog connection: typed access to the module, vendor and overlay stores
//!
//! [`Catalog`] owns the three namespaces of one backend, the notification
//! sink, and the single-flight guard that serializes deletion batches and
//! aggregate-cache rebuilds.

use crate::config::{BackendKind, Config, VendorDeletionPolicy};
use crate::error::{CatalogError, Result};
use crate::graph::CorpusSnapshot;
use crate::merge::{merge_module, merge_vendor_branch, merge_vendor_tree};
use crate::notify::{emit, EventKind, IndexingRequest, NotificationSink, TracingSink};
use crate::store::{
    is_empty_object, FileBackend, KeyValueBackend, KeyValueStore, MemoryBackend,
    MODULES_CACHE_KEY, VENDORS_CACHE_KEY,
};
use crate::types::{Module, ModuleKey, VendorBranch, VendorTree};
use crate::vendor::{flatten_tree, VendorPath};
use parking_lot::{Mutex, MutexGuard};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Behavioural settings carried by a [`Catalog`]
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    /// Policy for vendor-driven module deletion
    pub vendor_policy: VendorDeletionPolicy,
    /// Where module YANG files live, for indexing payloads
    pub save_file_dir: PathBuf,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            vendor_policy: VendorDeletionPolicy::default(),
            save_file_dir: PathBuf::from("all_modules"),
        }
    }
}

/// Handle on the catalog stores
pub struct Catalog {
    modules: KeyValueStore,
    vendors: KeyValueStore,
    temp: KeyValueStore,
    sink: Arc<dyn NotificationSink>,
    settings: CatalogSettings,
    batch_guard: Mutex<()>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("modules", &self.modules)
            .field("vendors", &self.vendors)
            .field("temp", &self.temp)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(what: &str, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| CatalogError::parse(what, e))
}

impl Catalog {
    /// Catalog over `backend` with the default database layout (1, 4, 5)
    #[must_use]
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self::with_layout(backend, 1, 4, 5)
    }

    /// Catalog over `backend` with explicit database indices
    #[must_use]
    pub fn with_layout(backend: Arc<dyn KeyValueBackend>, modules_db: u8, vendors_db: u8, temp_db: u8) -> Self {
        Self {
            modules: KeyValueStore::new(backend.clone(), modules_db, '@', Some(MODULES_CACHE_KEY)),
            vendors: KeyValueStore::new(backend.clone(), vendors_db, '/', Some(VENDORS_CACHE_KEY)),
            temp: KeyValueStore::new(backend, temp_db, '@', None),
            sink: Arc::new(TracingSink),
            settings: CatalogSettings::default(),
            batch_guard: Mutex::new(()),
        }
    }

    /// In-memory catalog
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Open the catalog described by `config`
    pub fn open(config: &Config) -> Result<Self> {
        let backend: Arc<dyn KeyValueBackend> = match config.store.backend {
            BackendKind::Memory => Arc::new(MemoryBackend::new()),
            BackendKind::File => Arc::new(FileBackend::open(&config.store.data_dir)?),
        };
        let catalog = Self::with_layout(
            backend,
            config.store.modules_db,
            config.store.vendors_db,
            config.store.temp_db,
        )
        .with_settings(CatalogSettings {
            vendor_policy: config.deletion.vendor_policy,
            save_file_dir: config.indexing.save_file_dir.clone(),
        });
        tracing::debug!(?catalog, "catalog opened");
        Ok(catalog)
    }

    /// Replace the notification sink
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the behavioural settings
    #[must_use]
    pub fn with_settings(mut self, settings: CatalogSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Current settings
    #[must_use]
    pub fn settings(&self) -> &CatalogSettings {
        &self.settings
    }

    /// Notification sink
    #[must_use]
    pub fn sink(&self) -> &dyn NotificationSink {
        self.sink.as_ref()
    }

    /// Raw modules namespace
    #[must_use]
    pub fn modules_store(&self) -> &KeyValueStore {
        &self.modules
    }

    /// Raw vendors namespace
    #[must_use]
    pub fn vendors_store(&self) -> &KeyValueStore {
        &self.vendors
    }

    /// Take the single-flight guard for a batch or cache rebuild
    pub(crate) fn lock_batch(&self) -> MutexGuard<'_, ()> {
        self.batch_guard.lock()
    }

    // =========================================================================
    // Modules
    // =========================================================================

    /// Module record, `None` when absent (or stored as an empty object)
    pub fn get_module(&self, key: &ModuleKey) -> Result<Option<Module>> {
        let raw = self.modules.get(&key.to_string())?;
        if is_empty_object(&raw) {
            return Ok(None);
        }
        decode(&key.to_string(), raw).map(Some)
    }

    /// Module record serialized as JSON, `"{}"` when absent
    pub fn get_module_raw(&self, key: &str) -> Result<String> {
        Ok(self.modules.get_raw(key)?.unwrap_or_else(|| "{}".to_string()))
    }

    /// Store a module record under `key`
    pub fn set_module(&self, module: &Module, key: &ModuleKey) -> Result<bool> {
        self.modules.set(&key.to_string(), module)
    }

    /// Stage a partial record in the temporary overlay
    pub fn set_temp_module(&self, key: &ModuleKey, partial: &Value) -> Result<bool> {
        self.temp.set(&key.to_string(), partial)
    }

    /// Remove module records; returns how many existed
    pub fn delete_modules(&self, keys: &[ModuleKey]) -> Result<usize> {
        let keys: Vec<String> = keys.iter().map(ToString::to_string).collect();
        self.modules.delete_keys(&keys)
    }

    /// Drop every `dependents` entry named `name` from one module
    pub fn delete_dependent(&self, key: &ModuleKey, name: &str) -> Result<bool> {
        let Some(mut module) = self.get_module(key)? else {
            return Ok(false);
        };
        let before = module.dependents.len();
        module.dependents.retain(|d| d.name != name);
        if module.dependents.len() == before {
            return Ok(false);
        }
        self.set_module(&module, key)
    }

    /// Drop the implementation whose `,`-joined identity is `implementation_key`
    pub fn delete_implementation(&self, key: &ModuleKey, implementation_key: &str) -> Result<bool> {
        let Some(mut module) = self.get_module(key)? else {
            return Ok(false);
        };
        let Some(implementations) = module.implementations.as_mut() else {
            return Ok(false);
        };
        let before = implementations.implementation.len();
        implementations
            .implementation
            .retain(|i| i.identity_key() != implementation_key);
        if implementations.implementation.len() == before {
            return Ok(false);
        }
        self.set_module(&module, key)
    }

    /// Read every primary module record into a snapshot
    ///
    /// Any unreadable or unparsable record fails the whole read.
    pub fn load_snapshot(&self) -> Result<CorpusSnapshot> {
        let mut modules = BTreeMap::new();
        for raw_key in self.modules.scan_all_keys()? {
            let key: ModuleKey = raw_key.parse()?;
            let value = self.modules.get(&raw_key)?;
            if is_empty_object(&value) {
                continue;
            }
            modules.insert(key, decode::<Module>(&raw_key, value)?);
        }
        Ok(CorpusSnapshot::new(modules))
    }

    /// Merge incoming module records into the store
    ///
    /// Each record is merged over what is stored under its key; a pending
    /// overlay entry for that key is then merged on top and consumed. Returns
    /// the merged records keyed by module key. Waits for any running deletion
    /// batch to finish.
    pub fn populate_modules(&self, new_modules: &[Module]) -> Result<BTreeMap<String, Module>> {
        let _guard = self.lock_batch();
        let mut merged_modules = BTreeMap::new();
        for new_module in new_modules {
            if !new_module.has_identity() {
                tracing::warn!(name = %new_module.name, "Skipping module without full identity");
                continue;
            }
            let key = new_module.key();
            let redis_key = key.to_string();

            let mut merged = match self.get_module(&key)? {
                Some(existing) => merge_module(existing, new_module),
                None => new_module.clone(),
            };

            let overlay = self.temp.get(&redis_key)?;
            if !is_empty_object(&overlay) {
                let overlay: Module = decode(&redis_key, overlay)?;
                merged = merge_module(merged, &overlay);
                self.temp.delete_keys(std::slice::from_ref(&redis_key))?;
                tracing::debug!(key = %redis_key, "applied temporary overlay");
            }

            self.set_module(&merged, &key)?;
            merged_modules.insert(redis_key, merged);
        }

        tracing::info!(count = merged_modules.len(), "populated modules");
        if !merged_modules.is_empty() {
            let request = IndexingRequest::populated(merged_modules.values(), &self.settings.save_file_dir);
            emit(self.sink(), EventKind::IndexingRequired { request });
        }
        Ok(merged_modules)
    }

    /// Aggregate modules cache, as last rebuilt
    pub fn get_all_modules(&self) -> Result<BTreeMap<String, Module>> {
        let raw = self.modules.get(MODULES_CACHE_KEY)?;
        decode(MODULES_CACHE_KEY, raw)
    }

    /// Rebuild the aggregate modules cache from primary records
    pub fn reload_modules_cache(&self) -> Result<usize> {
        let _guard = self.lock_batch();
        self.rebuild_modules_cache()
    }

    pub(crate) fn rebuild_modules_cache(&self) -> Result<usize> {
        let snapshot = self.load_snapshot()?;
        let data: BTreeMap<String, &Module> = snapshot
            .modules()
            .iter()
            .map(|(k, m)| (k.to_string(), m))
            .collect();
        self.modules.set(MODULES_CACHE_KEY, &data)?;
        tracing::info!(count = data.len(), "modules cache rebuilt");
        Ok(data.len())
    }

    // =========================================================================
    // Vendors
    // =========================================================================

    /// Data stored under one vendor key
    pub fn get_implementation_branch(&self, key: &str) -> Result<Option<VendorBranch>> {
        let raw = self.vendors.get(key)?;
        if is_empty_object(&raw) {
            return Ok(None);
        }
        decode(key, raw).map(Some)
    }

    /// Store data under one vendor key
    pub fn set_implementation_branch(&self, key: &str, branch: &VendorBranch) -> Result<bool> {
        self.vendors.set(key, branch)
    }

    /// Flatten a vendor tree into per-flavor keys and merge each into the store
    ///
    /// Returns the vendor keys written.
    pub fn populate_vendors(&self, tree: &VendorTree) -> Result<Vec<String>> {
        let _guard = self.lock_batch();
        let leaves = flatten_tree(tree);
        let mut written = Vec::with_capacity(leaves.len());
        for (key, branch) in leaves {
            let merged = match self.get_implementation_branch(&key)? {
                Some(mut existing) => {
                    merge_vendor_branch(&mut existing, &branch);
                    existing
                }
                None => branch,
            };
            self.set_implementation_branch(&key, &merged)?;
            written.push(key);
        }
        tracing::info!(count = written.len(), "populated vendor branches");
        Ok(written)
    }

    /// Nested vendor tree assembled from every vendor key containing `filter`
    ///
    /// An empty filter selects everything.
    pub fn create_vendors_data(&self, filter: &str) -> Result<VendorTree> {
        let mut tree = VendorTree::default();
        for key in self.vendors.scan_all_keys()? {
            if !key.contains(filter) {
                continue;
            }
            let path = match VendorPath::parse(&key) {
                Ok(path) => path,
                Err(e) => {
                    tracing::warn!("Skipping vendor key: {}", e);
                    continue;
                }
            };
            let Some(branch) = self.get_implementation_branch(&key)? else {
                continue;
            };
            merge_vendor_tree(&mut tree, &path.to_tree(branch));
        }
        Ok(tree)
    }

    /// Aggregate vendors cache, as last rebuilt
    pub fn get_all_vendors(&self) -> Result<VendorTree> {
        let raw = self.vendors.get(VENDORS_CACHE_KEY)?;
        decode(VENDORS_CACHE_KEY, raw)
    }

    /// Rebuild the aggregate vendors cache from the vendor keys
    pub fn reload_vendors_cache(&self) -> Result<usize> {
        let _guard = self.lock_batch();
        self.rebuild_vendors_cache()
    }

    pub(crate) fn rebuild_vendors_cache(&self) -> Result<usize> {
        let tree = self.create_vendors_data("")?;
        self.vendors.set(VENDORS_CACHE_KEY, &tree)?;
        tracing::info!(vendors = tree.vendors.len(), "vendors cache rebuilt");
        Ok(tree.vendors.len())
    }

    /// Delete every vendor key containing `branch_key`; returns the count
    pub fn delete_vendor(&self, branch_key: &str) -> Result<usize> {
        let keys: Vec<String> = self
            .vendors
            .scan_all_keys()?
            .into_iter()
            .filter(|k| k.contains(branch_key))
            .collect();
        self.vendors.delete_keys(&keys)
    }
}
