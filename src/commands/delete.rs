// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Deletion commands - remove modules or a vendor branch

use super::{read_json, report, Output};
use crate::catalog::Catalog;
use crate::deletion::{delete_modules, delete_vendor_branch};
use crate::types::ModuleKey;
use crate::vendor::VendorSelector;
use anyhow::{bail, Context, Result};
use std::path::PathBuf;

/// Delete modules given as `name@revision/organization` keys and/or a JSON
/// file listing `{name, revision, organization}` objects
pub fn run_modules(catalog: &Catalog, keys: &[String], file: Option<PathBuf>, out: Output) -> Result<()> {
    let mut requested: Vec<ModuleKey> = keys
        .iter()
        .map(|k| k.parse::<ModuleKey>())
        .collect::<std::result::Result<_, _>>()
        .context("Invalid module key")?;

    if let Some(path) = file {
        let listed: Vec<ModuleKey> = serde_json::from_value(read_json(&path)?)
            .with_context(|| format!("{} is not a list of modules", path.display()))?;
        requested.extend(listed);
    }

    if requested.is_empty() {
        bail!("No modules given. Pass keys like name@revision/organization or --file");
    }

    tracing::info!("Deleting {} module(s)", requested.len());
    let outcome = delete_modules(catalog, &requested);
    report(&outcome, out)
}

/// Delete a vendor branch
pub fn run_vendor(catalog: &Catalog, selector: &VendorSelector, out: Output) -> Result<()> {
    tracing::info!("Deleting vendor branch {}", selector.branch_key());
    let outcome = delete_vendor_branch(catalog, selector);
    report(&outcome, out)
}
