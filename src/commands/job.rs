// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Run a registered job by name, the way a queue worker would

use super::{read_json, Output};
use crate::catalog::Catalog;
use crate::deletion::BatchStatus;
use crate::jobs::JobRegistry;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::path::PathBuf;

/// Run job command
pub fn run(
    catalog: &Catalog,
    name: Option<String>,
    args: Option<String>,
    file: Option<PathBuf>,
    out: Output,
) -> Result<()> {
    let registry = JobRegistry::builtin();

    let Some(name) = name else {
        println!("Jobs:");
        for job in registry.names() {
            println!("  {job}");
        }
        return Ok(());
    };

    let args: Value = match (args, file) {
        (Some(_), Some(_)) => bail!("Pass job arguments inline or with --file, not both"),
        (Some(text), None) => serde_json::from_str(&text).context("Job arguments are not JSON")?,
        (None, Some(path)) => read_json(&path)?,
        (None, None) => Value::Null,
    };

    let response = registry.dispatch(catalog, &name, &args)?;
    if out.json {
        out.print_json(&response)?;
    } else {
        println!("{}: {}", out.status(response.status), response.message);
    }

    if response.status == BatchStatus::Fail {
        bail!("Job {} failed", name);
    }
    Ok(())
}
