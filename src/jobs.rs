// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Job dispatch table
//!
//! Queue receivers, workers and the CLI all hand a job name plus a JSON
//! argument to [`JobRegistry::dispatch`]; handlers are plain functions
//! registered by name.

use crate::catalog::Catalog;
use crate::deletion::{delete_modules, delete_vendor_branch, BatchStatus};
use crate::error::{CatalogError, Result};
use crate::types::{Module, ModuleKey, ModulesPayload, VendorTree, VendorsPayload};
use crate::vendor::VendorSelector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Result returned to whoever queued the job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResponse {
    /// Tri-state status
    pub status: BatchStatus,
    /// Human-readable detail
    pub message: String,
}

impl JobResponse {
    /// Successful response
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: BatchStatus::Success,
            message: message.into(),
        }
    }

    /// Failed response
    #[must_use]
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            status: BatchStatus::Fail,
            message: message.into(),
        }
    }
}

/// Handler signature
pub type JobHandler = fn(&Catalog, &Value) -> Result<JobResponse>;

/// Name → handler table
#[derive(Clone, Default)]
pub struct JobRegistry {
    handlers: BTreeMap<&'static str, JobHandler>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry").field("jobs", &self.names()).finish()
    }
}

impl JobRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in job
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("populate-modules", populate_modules_job);
        registry.register("populate-vendors", populate_vendors_job);
        registry.register("delete-modules", delete_modules_job);
        registry.register("delete-vendor", delete_vendor_job);
        registry.register("reload-cache", reload_cache_job);
        registry
    }

    /// Add or replace a handler
    pub fn register(&mut self, name: &'static str, handler: JobHandler) {
        self.handlers.insert(name, handler);
    }

    /// Registered job names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    /// Run job `name`; handler errors become a failed response
    pub fn dispatch(&self, catalog: &Catalog, name: &str, args: &Value) -> Result<JobResponse> {
        let handler = self
            .handlers
            .get(name)
            .ok_or_else(|| CatalogError::UnknownJob(name.to_string()))?;
        tracing::info!(job = name, "dispatching job");
        Ok(handler(catalog, args).unwrap_or_else(|e| {
            tracing::error!("Job {} failed: {}", name, e);
            JobResponse::fail(e.to_string())
        }))
    }
}

fn parse_args<T: DeserializeOwned>(job: &str, args: &Value) -> Result<T> {
    serde_json::from_value(args.clone()).map_err(|e| CatalogError::InvalidPayload {
        job: job.to_string(),
        reason: e.to_string(),
    })
}

/// Modules given as `{"modules": {"module": [...]}}` or a bare list
#[derive(Deserialize)]
#[serde(untagged)]
enum ModulesArg {
    Wrapped(ModulesPayload),
    List(Vec<Module>),
}

/// Vendors given as `{"vendors": {"vendor": [...]}}` or a vendor tree
#[derive(Deserialize)]
#[serde(untagged)]
enum VendorsArg {
    Wrapped(VendorsPayload),
    Tree(VendorTree),
}

/// Module keys given as strings or `{name, revision, organization}` objects
#[derive(Deserialize)]
#[serde(untagged)]
enum KeyArg {
    Text(String),
    Object(ModuleKey),
}

fn populate_modules_job(catalog: &Catalog, args: &Value) -> Result<JobResponse> {
    let modules = match parse_args::<ModulesArg>("populate-modules", args)? {
        ModulesArg::Wrapped(payload) => payload.modules.module,
        ModulesArg::List(list) => list,
    };
    let merged = catalog.populate_modules(&modules)?;
    Ok(JobResponse::success(format!("populated {} modules", merged.len())))
}

fn populate_vendors_job(catalog: &Catalog, args: &Value) -> Result<JobResponse> {
    let tree = match parse_args::<VendorsArg>("populate-vendors", args)? {
        VendorsArg::Wrapped(payload) => VendorTree {
            vendors: payload.vendors.vendor,
        },
        VendorsArg::Tree(tree) => tree,
    };
    let written = catalog.populate_vendors(&tree)?;
    Ok(JobResponse::success(format!("populated {} vendor branches", written.len())))
}

fn delete_modules_job(catalog: &Catalog, args: &Value) -> Result<JobResponse> {
    let keys = parse_args::<Vec<KeyArg>>("delete-modules", args)?
        .into_iter()
        .map(|k| match k {
            KeyArg::Text(text) => text.parse(),
            KeyArg::Object(key) => Ok(key),
        })
        .collect::<Result<Vec<ModuleKey>>>()?;
    let outcome = delete_modules(catalog, &keys);
    Ok(JobResponse {
        status: outcome.status,
        message: outcome.message(),
    })
}

fn delete_vendor_job(catalog: &Catalog, args: &Value) -> Result<JobResponse> {
    let selector: VendorSelector = parse_args("delete-vendor", args)?;
    let outcome = delete_vendor_branch(catalog, &selector);
    Ok(JobResponse {
        status: outcome.status,
        message: outcome.message(),
    })
}

fn reload_cache_job(catalog: &Catalog, _args: &Value) -> Result<JobResponse> {
    let modules = catalog.reload_modules_cache()?;
    let vendors = catalog.reload_vendors_cache()?;
    Ok(JobResponse::success(format!(
        "cached {modules} modules and {vendors} vendors"
    )))
}
