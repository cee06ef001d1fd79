// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Command implementations

pub mod cache;
pub mod config;
pub mod delete;
pub mod get;
pub mod job;
pub mod populate;

use crate::deletion::{BatchOutcome, BatchStatus};
use anyhow::{bail, Context, Result};
use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use std::io::Read;
use std::path::Path;

/// Output options shared by every command
#[derive(Debug, Clone, Copy, Default)]
pub struct Output {
    /// Print machine-readable JSON
    pub json: bool,
    /// Use ANSI colors in human output
    pub color: bool,
}

impl Output {
    /// Print `value` as pretty JSON
    pub fn print_json<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        println!(
            "{}",
            serde_json::to_string_pretty(value).context("Failed to serialize output")?
        );
        Ok(())
    }

    fn status(&self, status: BatchStatus) -> String {
        let text = status.to_string();
        if !self.color {
            return text;
        }
        match status {
            BatchStatus::Success => text.green().to_string(),
            BatchStatus::InProgress => text.yellow().to_string(),
            BatchStatus::Fail => text.red().to_string(),
        }
    }
}

/// Read a JSON document from a file, or stdin when the path is `-`
pub fn read_json(path: &Path) -> Result<Value> {
    let content = if path.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?
    };
    serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
}

/// Print a batch outcome; a failed batch becomes an error
pub fn report(outcome: &BatchOutcome, out: Output) -> Result<()> {
    if out.json {
        out.print_json(outcome)?;
    } else {
        println!("Status: {}", out.status(outcome.status));
        if !outcome.deleted.is_empty() {
            println!("Deleted ({}):", outcome.deleted.len());
            for key in &outcome.deleted {
                println!("  {key}");
            }
        }
        if !outcome.not_deleted.is_empty() {
            println!("Not deleted ({}):", outcome.not_deleted.len());
            for kept in &outcome.not_deleted {
                println!(
                    "  {} (referenced by {} in {})",
                    kept.key, kept.referenced_by, kept.relation
                );
            }
        }
        if !outcome.not_found.is_empty() {
            println!("Not stored: {}", outcome.not_found.join(", "));
        }
        if !outcome.dependents_updated.is_empty() {
            println!("Dependents updated: {}", outcome.dependents_updated.join(", "));
        }
        if outcome.implementations_removed > 0 || outcome.vendor_keys_removed > 0 {
            println!(
                "Implementations removed: {}, vendor branches removed: {}",
                outcome.implementations_removed, outcome.vendor_keys_removed
            );
        }
    }

    if outcome.status == BatchStatus::Fail {
        bail!("{}", outcome.message());
    }
    Ok(())
}
