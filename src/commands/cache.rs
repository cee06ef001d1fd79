// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Cache command - rebuild the aggregate caches

use super::Output;
use crate::catalog::Catalog;
use anyhow::{Context, Result};

/// Rebuild both aggregate caches
pub fn run(catalog: &Catalog, out: Output) -> Result<()> {
    let modules = catalog
        .reload_modules_cache()
        .context("Failed to rebuild modules cache")?;
    let vendors = catalog
        .reload_vendors_cache()
        .context("Failed to rebuild vendors cache")?;

    if out.json {
        out.print_json(&serde_json::json!({"modules": modules, "vendors": vendors}))
    } else {
        println!("Cached {modules} module(s) and {vendors} vendor(s)");
        Ok(())
    }
}
