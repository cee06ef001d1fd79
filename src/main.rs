// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! yangcat CLI - YANG module catalog storage maintenance

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use yangcat::catalog::Catalog;
use yangcat::commands::{self, get::GetTarget, Output};
use yangcat::config;
use yangcat::vendor::VendorSelector;

#[derive(Parser)]
#[command(name = "yangcat")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short, long)]
    quiet: bool,

    /// Configuration file path
    #[arg(short, long, env = "YANGCAT_CONFIG")]
    config: Option<std::path::PathBuf>,

    /// Data directory override
    #[arg(long, env = "YANGCAT_DATA_DIR")]
    data_dir: Option<std::path::PathBuf>,

    /// Disable colored output
    #[arg(long, env = "NO_COLOR")]
    no_color: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge module and vendor payloads into the store
    Populate {
        /// JSON file of modules ({"modules": {"module": [...]}}), `-` for stdin
        #[arg(long)]
        modules: Option<std::path::PathBuf>,

        /// JSON file of vendors ({"vendors": {"vendor": [...]}})
        #[arg(long)]
        vendors: Option<std::path::PathBuf>,

        /// JSON file mapping module keys to late corrections
        #[arg(long)]
        overlay: Option<std::path::PathBuf>,
    },

    /// Delete modules no other module still depends on
    DeleteModules {
        /// Module keys (name@revision/organization)
        keys: Vec<String>,

        /// JSON file listing {name, revision, organization} objects
        #[arg(long)]
        file: Option<std::path::PathBuf>,
    },

    /// Delete a vendor branch and the implementations it contributed
    DeleteVendor {
        /// Vendor name
        #[arg(long)]
        vendor: String,

        /// Platform
        #[arg(long)]
        platform: Option<String>,

        /// Software version
        #[arg(long)]
        software_version: Option<String>,

        /// Software flavor
        #[arg(long)]
        software_flavor: Option<String>,
    },

    /// Print stored records
    Get {
        #[command(subcommand)]
        target: GetTarget,
    },

    /// Rebuild the aggregate modules and vendors caches
    ReloadCache,

    /// Run a registered job (lists jobs when no name is given)
    Job {
        /// Job name
        name: Option<String>,

        /// Inline JSON arguments
        args: Option<String>,

        /// Read JSON arguments from a file
        #[arg(long)]
        file: Option<std::path::PathBuf>,
    },

    /// Show the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = config::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.store.data_dir.clone_from(dir);
    }

    // Initialize logging
    let log_level = match cli.verbose {
        0 if cli.quiet => "error",
        0 => config.log_level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let out = Output {
        json: cli.json,
        color: !cli.no_color,
    };

    if let Commands::Config = cli.command {
        return commands::config::run(&config, out);
    }

    let catalog = Catalog::open(&config)
        .with_context(|| format!("Failed to open store at {}", config.store.data_dir.display()))?;

    // Execute command
    match cli.command {
        Commands::Populate { modules, vendors, overlay } => {
            commands::populate::run(&catalog, modules, vendors, overlay, out)
        }
        Commands::DeleteModules { keys, file } => {
            commands::delete::run_modules(&catalog, &keys, file, out)
        }
        Commands::DeleteVendor { vendor, platform, software_version, software_flavor } => {
            let selector = VendorSelector {
                vendor,
                platform,
                software_version,
                software_flavor,
            };
            commands::delete::run_vendor(&catalog, &selector, out)
        }
        Commands::Get { target } => {
            commands::get::run(&catalog, &target, out)
        }
        Commands::ReloadCache => {
            commands::cache::run(&catalog, out)
        }
        Commands::Job { name, args, file } => {
            commands::job::run(&catalog, name, args, file, out)
        }
        Commands::Config => {
            commands::config::run(&config, out)
        }
    }
}
