// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Key-value store client
//!
//! A backend holds several numbered databases of string values. A
//! [`KeyValueStore`] addresses one of them and adds the JSON conventions the
//! catalog relies on: absent keys read back as an empty object, and scans skip
//! the aggregate-cache key and anything without the namespace delimiter.

use crate::error::{CatalogError, Result};
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Aggregate cache key of the modules database
pub const MODULES_CACHE_KEY: &str = "modules-data";
/// Aggregate cache key of the vendors database
pub const VENDORS_CACHE_KEY: &str = "vendors-data";

/// Raw storage primitives over numbered databases
pub trait KeyValueBackend: Send + Sync {
    /// Read a value
    fn get(&self, db: u8, key: &str) -> Result<Option<String>>;
    /// Write a value
    fn set(&self, db: u8, key: &str, value: String) -> Result<()>;
    /// Remove keys, returning how many existed
    fn delete(&self, db: u8, keys: &[String]) -> Result<usize>;
    /// All keys of a database, sorted
    fn keys(&self, db: u8) -> Result<Vec<String>>;
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-process backend, used by tests and throwaway runs
#[derive(Debug, Default)]
pub struct MemoryBackend {
    dbs: RwLock<HashMap<u8, BTreeMap<String, String>>>,
}

impl MemoryBackend {
    /// Create an empty backend
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueBackend for MemoryBackend {
    fn get(&self, db: u8, key: &str) -> Result<Option<String>> {
        Ok(self.dbs.read().get(&db).and_then(|d| d.get(key).cloned()))
    }

    fn set(&self, db: u8, key: &str, value: String) -> Result<()> {
        self.dbs.write().entry(db).or_default().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, db: u8, keys: &[String]) -> Result<usize> {
        let mut dbs = self.dbs.write();
        let Some(data) = dbs.get_mut(&db) else {
            return Ok(0);
        };
        Ok(keys.iter().filter(|k| data.remove(k.as_str()).is_some()).count())
    }

    fn keys(&self, db: u8) -> Result<Vec<String>> {
        Ok(self
            .dbs
            .read()
            .get(&db)
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// File Backend
// =============================================================================

/// Backend persisting each database as `db<index>.json` in a data directory
///
/// Databases are loaded on first access and rewritten after every mutation.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
    dbs: RwLock<HashMap<u8, BTreeMap<String, String>>>,
}

impl FileBackend {
    /// Open (or create) a file backend rooted at `dir`
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|source| CatalogError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self {
            dir: dir.to_path_buf(),
            dbs: RwLock::new(HashMap::new()),
        })
    }

    fn db_path(&self, db: u8) -> PathBuf {
        self.dir.join(format!("db{db}.json"))
    }

    fn load(&self, db: u8) -> Result<BTreeMap<String, String>> {
        let path = self.db_path(db);
        if !path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&path).map_err(|source| CatalogError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content)
            .map_err(|e| CatalogError::parse(path.display().to_string(), e))
    }

    fn save(&self, db: u8, data: &BTreeMap<String, String>) -> Result<()> {
        let path = self.db_path(db);
        let json = serde_json::to_string_pretty(data)
            .map_err(|e| CatalogError::serialize(path.display().to_string(), e))?;
        fs::write(&path, json).map_err(|source| CatalogError::Io { path, source })
    }

    fn ensure_loaded(&self, db: u8) -> Result<()> {
        if self.dbs.read().contains_key(&db) {
            return Ok(());
        }
        let data = self.load(db)?;
        self.dbs.write().entry(db).or_insert(data);
        Ok(())
    }
}

impl KeyValueBackend for FileBackend {
    fn get(&self, db: u8, key: &str) -> Result<Option<String>> {
        self.ensure_loaded(db)?;
        Ok(self.dbs.read().get(&db).and_then(|d| d.get(key).cloned()))
    }

    fn set(&self, db: u8, key: &str, value: String) -> Result<()> {
        self.ensure_loaded(db)?;
        let mut dbs = self.dbs.write();
        let data = dbs.entry(db).or_default();
        data.insert(key.to_string(), value);
        self.save(db, data)
    }

    fn delete(&self, db: u8, keys: &[String]) -> Result<usize> {
        self.ensure_loaded(db)?;
        let mut dbs = self.dbs.write();
        let data = dbs.entry(db).or_default();
        let removed = keys.iter().filter(|k| data.remove(k.as_str()).is_some()).count();
        if removed > 0 {
            self.save(db, data)?;
        }
        Ok(removed)
    }

    fn keys(&self, db: u8) -> Result<Vec<String>> {
        self.ensure_loaded(db)?;
        Ok(self
            .dbs
            .read()
            .get(&db)
            .map(|d| d.keys().cloned().collect())
            .unwrap_or_default())
    }
}

// =============================================================================
// Namespaced Store
// =============================================================================

/// One logical namespace (modules, vendors, temporary overlay) of a backend
#[derive(Clone)]
pub struct KeyValueStore {
    backend: Arc<dyn KeyValueBackend>,
    db: u8,
    delimiter: char,
    cache_key: Option<&'static str>,
}

impl std::fmt::Debug for KeyValueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyValueStore")
            .field("db", &self.db)
            .field("delimiter", &self.delimiter)
            .field("cache_key", &self.cache_key)
            .finish_non_exhaustive()
    }
}

impl KeyValueStore {
    /// Address database `db`; leaf keys must contain `delimiter`
    #[must_use]
    pub fn new(
        backend: Arc<dyn KeyValueBackend>,
        db: u8,
        delimiter: char,
        cache_key: Option<&'static str>,
    ) -> Self {
        Self {
            backend,
            db,
            delimiter,
            cache_key,
        }
    }

    /// Database index this store addresses
    #[must_use]
    pub fn db(&self) -> u8 {
        self.db
    }

    /// Raw stored string, if any
    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.backend.get(self.db, key)
    }

    /// Stored JSON document, or an empty object when the key is absent
    pub fn get(&self, key: &str) -> Result<Value> {
        match self.get_raw(key)? {
            Some(raw) => serde_json::from_str(&raw).map_err(|e| CatalogError::parse(key, e)),
            None => Ok(Value::Object(Map::new())),
        }
    }

    /// Serialize and store a document
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<bool> {
        let json = serde_json::to_string(value).map_err(|e| CatalogError::serialize(key, e))?;
        self.backend.set(self.db, key, json)?;
        tracing::trace!(db = self.db, key, "stored");
        Ok(true)
    }

    /// Remove keys; returns how many were actually present
    pub fn delete_keys(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        let removed = self.backend.delete(self.db, keys)?;
        tracing::debug!(db = self.db, requested = keys.len(), removed, "deleted keys");
        Ok(removed)
    }

    /// All leaf keys: skips the cache key and keys without the delimiter
    pub fn scan_all_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .backend
            .keys(self.db)?
            .into_iter()
            .filter(|k| Some(k.as_str()) != self.cache_key && k.contains(self.delimiter))
            .collect())
    }

    /// Whether the document stored under `key` is missing or an empty object
    pub fn is_empty_at(&self, key: &str) -> Result<bool> {
        Ok(is_empty_object(&self.get(key)?))
    }
}

/// The empty-object sentinel returned for absent keys
#[must_use]
pub fn is_empty_object(value: &Value) -> bool {
    matches!(value, Value::Object(m) if m.is_empty())
}
