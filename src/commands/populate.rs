// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Population commands - merge module and vendor payloads into the store

use super::{read_json, Output};
use crate::catalog::Catalog;
use crate::jobs::JobRegistry;
use crate::types::ModuleKey;
use anyhow::{bail, Result};
use std::path::PathBuf;

/// Populate modules and/or vendors from JSON files
pub fn run(
    catalog: &Catalog,
    modules: Option<PathBuf>,
    vendors: Option<PathBuf>,
    overlay: Option<PathBuf>,
    out: Output,
) -> Result<()> {
    if modules.is_none() && vendors.is_none() && overlay.is_none() {
        bail!("Nothing to populate. Use --modules, --vendors or --overlay");
    }

    // overlay entries must be staged before the modules they correct
    if let Some(path) = overlay {
        let staged = stage_overlay(catalog, &read_json(&path)?)?;
        if !out.json {
            println!("Staged {staged} overlay record(s)");
        }
    }

    let registry = JobRegistry::builtin();
    let mut responses = Vec::new();
    if let Some(path) = vendors {
        responses.push(registry.dispatch(catalog, "populate-vendors", &read_json(&path)?)?);
    }
    if let Some(path) = modules {
        responses.push(registry.dispatch(catalog, "populate-modules", &read_json(&path)?)?);
    }

    if out.json {
        out.print_json(&responses)?;
    } else {
        for response in &responses {
            println!("{}: {}", out.status(response.status), response.message);
        }
    }

    if let Some(failed) = responses
        .iter()
        .find(|r| r.status == crate::deletion::BatchStatus::Fail)
    {
        bail!("{}", failed.message);
    }
    Ok(())
}

/// Stage `{"<key>": {partial record}, ...}` in the temporary overlay
fn stage_overlay(catalog: &Catalog, value: &serde_json::Value) -> Result<usize> {
    let Some(entries) = value.as_object() else {
        bail!("Overlay file must map module keys to partial records");
    };
    for (key, partial) in entries {
        let key: ModuleKey = key.parse()?;
        catalog.set_temp_module(&key, partial)?;
    }
    Ok(entries.len())
}
