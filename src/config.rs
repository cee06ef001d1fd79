// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Configuration management
//!
//! Sources, lowest priority first: built-in defaults, an optional TOML file,
//! then `YANGCAT_*` environment variables (`__` separates nested keys, e.g.
//! `YANGCAT_STORE__MODULES_DB=3`).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which backend holds the databases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// In-process maps, lost on exit
    Memory,
    /// JSON files under the data directory
    File,
}

/// How vendor-branch deletion treats modules other modules still reference
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VendorDeletionPolicy {
    /// Delete vendor-owned modules without consulting references
    #[default]
    Authoritative,
    /// Keep vendor-owned modules that are still referenced
    RespectReferences,
}

/// Store location and database layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Backend kind
    pub backend: BackendKind,
    /// Directory for the file backend
    pub data_dir: PathBuf,
    /// Database index of module records
    pub modules_db: u8,
    /// Database index of vendor branches
    pub vendors_db: u8,
    /// Database index of the temporary overlay
    pub temp_db: u8,
}

/// Deletion behaviour
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeletionConfig {
    /// Policy for vendor-driven module deletion
    pub vendor_policy: VendorDeletionPolicy,
}

/// Indexing hand-off settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingConfig {
    /// Directory where module YANG files are saved
    pub save_file_dir: PathBuf,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Store settings
    pub store: StoreConfig,
    /// Deletion settings
    pub deletion: DeletionConfig,
    /// Indexing settings
    pub indexing: IndexingConfig,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("org", "yangcatalog", "yangcat")
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|d| d.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from(".yangcat"));
        Self {
            store: StoreConfig {
                backend: BackendKind::File,
                data_dir: data_dir.join("store"),
                modules_db: 1,
                vendors_db: 4,
                temp_db: 5,
            },
            deletion: DeletionConfig::default(),
            indexing: IndexingConfig {
                save_file_dir: data_dir.join("all_modules"),
            },
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to render configuration")
    }
}

/// Load configuration from defaults, an optional file and the environment
pub fn load(path: Option<&Path>) -> Result<Config> {
    let defaults = config::Config::try_from(&Config::default())
        .context("Failed to build default configuration")?;
    let mut builder = config::Config::builder().add_source(defaults);

    if let Some(path) = path {
        builder = builder.add_source(
            config::File::from(path)
                .format(config::FileFormat::Toml)
                .required(true),
        );
    }

    builder = builder.add_source(
        config::Environment::with_prefix("YANGCAT")
            .prefix_separator("_")
            .separator("__")
            .ignore_empty(true)
            .try_parsing(true),
    );

    let loaded: Config = builder
        .build()
        .context("Failed to load configuration")?
        .try_deserialize()
        .context("Invalid configuration")?;
    tracing::debug!(?loaded, "configuration loaded");
    Ok(loaded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_round_trip_through_loader() {
        let loaded = load(None).unwrap();
        assert_eq!(loaded.store.modules_db, 1);
        assert_eq!(loaded.store.vendors_db, 4);
        assert_eq!(loaded.store.temp_db, 5);
        assert_eq!(loaded.deletion.vendor_policy, VendorDeletionPolicy::Authoritative);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("yangcat.toml");
        std::fs::write(
            &path,
            "[store]\nbackend = \"memory\"\nmodules_db = 7\n\n[deletion]\nvendor_policy = \"respect-references\"\n",
        )
        .unwrap();

        let loaded = load(Some(&path)).unwrap();
        assert_eq!(loaded.store.backend, BackendKind::Memory);
        assert_eq!(loaded.store.modules_db, 7);
        assert_eq!(loaded.store.vendors_db, 4);
        assert_eq!(loaded.deletion.vendor_policy, VendorDeletionPolicy::RespectReferences);
    }

    #[test]
    fn test_renders_as_toml() {
        let rendered = Config::default().to_toml().unwrap();
        assert!(rendered.contains("[store]"));
        assert!(rendered.contains("modules_db = 1"));
    }
}
