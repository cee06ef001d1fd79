// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Read commands - print stored records and aggregate caches

use super::Output;
use crate::catalog::Catalog;
use anyhow::{Context, Result};
use clap::Subcommand;

/// What to read
#[derive(Debug, Subcommand)]
pub enum GetTarget {
    /// One module record by `name@revision/organization`
    Module {
        /// Module key
        key: String,
    },
    /// One vendor branch by `vendor/platform/version/flavor` key
    Branch {
        /// Encoded vendor key
        key: String,
    },
    /// The aggregate modules cache
    AllModules,
    /// The aggregate vendors cache
    AllVendors,
    /// Nested vendor tree built from branches containing a key fragment
    Vendors {
        /// Key fragment, e.g. `cisco/ASR9K`
        #[arg(default_value = "")]
        filter: String,
    },
}

/// Run get command
pub fn run(catalog: &Catalog, target: &GetTarget, out: Output) -> Result<()> {
    match target {
        GetTarget::Module { key } => {
            let raw = catalog.get_module_raw(key)?;
            let value: serde_json::Value =
                serde_json::from_str(&raw).with_context(|| format!("Stored record {key} is not JSON"))?;
            out.print_json(&value)
        }
        GetTarget::Branch { key } => match catalog.get_implementation_branch(key)? {
            Some(branch) => out.print_json(&branch),
            None => out.print_json(&serde_json::json!({})),
        },
        GetTarget::AllModules => {
            let modules = catalog.get_all_modules()?;
            if out.json {
                out.print_json(&modules)
            } else {
                if modules.is_empty() {
                    println!("Modules cache is empty. Run 'yangcat reload-cache' to rebuild it.");
                }
                for key in modules.keys() {
                    println!("{key}");
                }
                Ok(())
            }
        }
        GetTarget::AllVendors => out.print_json(&catalog.get_all_vendors()?),
        GetTarget::Vendors { filter } => out.print_json(&catalog.create_vendors_data(filter)?),
    }
}
