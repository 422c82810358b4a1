//! `billing-backup` — dump the billing database, then write the invoice run
//! script.
//!
//! # Overview
//!
//! Before each billing run the stable's MySQL database is dumped to a
//! timestamped `.sql` file, and a small bash script is written that runs
//! invoice-data generation followed by PDF rendering for the chosen month.
//! Everything is driven by an optional `billing.toml`.
//!
//! # Usage
//!
//! ```text
//! billing-backup                       # dump + script for the current month
//! billing-backup --previous-month      # bill last month
//! billing-backup -m 3 -y 2025          # bill March 2025
//! billing-backup --no-backup           # only (re)write the script
//! billing-backup init                  # scaffold a billing.toml
//! billing-backup --print-config        # show the merged config and exit
//! ```
//!
//! # Module layout
//!
//! | Module                   | Responsibility                              |
//! |--------------------------|---------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap               |
//! | [`config`]               | `Config` struct, layered TOML loading       |
//! | [`period`]               | Billing month resolution                    |
//! | [`runner`]               | Dump command construction                   |
//! | [`script`]               | Billing script rendering and writing        |
//! | [`ui`]                   | Spinner, captured execution, stage output   |
//! | [`commands::init`]       | `billing-backup init` subcommand            |
//! | [`commands::run`]        | Default pipeline                            |

mod cli;
mod commands;
mod config;
mod period;
mod runner;
mod script;
mod ui;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Subcommand};
use config::{PASSWORD_ENV, PartialConfig, parse_partial};

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(e) = cli.check_subcommand_flags() {
        e.exit();
    }

    match &cli.command {
        // ── billing-backup init ───────────────────────────────────────────────
        Some(Subcommand::Init) => {
            commands::init::run(&cli.config)?;
        },

        // ── billing-backup (default pipeline) ─────────────────────────────────
        None => {
            let cfg = load_merged_config(&cli.config)?;

            if cli.print_config {
                println!("{cfg:#?}");
                return Ok(());
            }

            commands::run::run(&cli, &cfg)?;
        },
    }

    Ok(())
}

/// Load configuration from two sources and merge them.
///
/// 1. `~/.config/billing-backup/config.toml` — shared defaults, e.g. the database host
/// 2. `local_path` (default: `./billing.toml`) — per-directory overrides
///
/// Local values win on a per-field basis.  Either file may be absent, but a
/// file that exists and does not parse is an error.  Finally
/// `BILLING_DB_PASSWORD` replaces the configured password when set.
fn load_merged_config(local_path: &std::path::Path) -> Result<config::Config> {
    let global_path = dirs_next::config_dir().map(|d| d.join("billing-backup").join("config.toml"));

    let global: PartialConfig = match global_path.as_deref() {
        Some(p) => parse_partial(p)?.unwrap_or_default(),
        None => PartialConfig::default(),
    };

    let local: PartialConfig = if let Some(p) = parse_partial(local_path)? {
        p
    } else {
        eprintln!(
            "Warning: config file '{}' not found, using defaults.\n\
             Run 'billing-backup init' to generate a starter config.",
            local_path.display()
        );
        PartialConfig::default()
    };

    let mut cfg = global.merge(local).resolve()?;
    cfg.database.override_password(std::env::var(PASSWORD_ENV).ok());
    Ok(cfg)
}
