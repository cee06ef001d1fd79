// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Show the effective configuration

use super::Output;
use crate::config::Config;
use anyhow::Result;

/// Print the effective configuration
pub fn run(config: &Config, out: Output) -> Result<()> {
    if out.json {
        out.print_json(config)
    } else {
        print!("{}", config.to_toml()?);
        Ok(())
    }
}
