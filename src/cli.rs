//! Command-line interface definition.
//!
//! All argument parsing lives here so the rest of the codebase can stay
//! agnostic to `clap`.  The `Cli` struct is parsed once in `main` and then
//! passed (by reference) into the command handlers.

use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI arguments, shared across every subcommand.
#[derive(Parser, Debug)]
#[command(
    name    = "billing-backup",
    about   = "Dump the billing database and write the invoice run script",
    version,
    help_template = "\
{before-help}{name} {version}
{about}

{usage-heading} {usage}

{all-args}{after-help}"
)]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Path to the configuration file.
    ///
    /// Defaults to `billing.toml` in the current working directory.
    #[arg(short, long, default_value = "billing.toml")]
    pub config: PathBuf,

    /// Subcommand to run.  Omit to run the backup and script generation.
    #[command(subcommand)]
    pub command: Option<Subcommand>,

    /// Print the parsed configuration and exit without running anything.
    #[arg(long)]
    pub print_config: bool,

    /// Skip the database dump and only write the billing script.
    #[arg(long)]
    pub no_backup: bool,

    /// Skip writing the billing script.
    #[arg(long)]
    pub no_script: bool,

    /// Billing month (1-12) passed to the invoice and PDF steps.
    #[arg(
        short,
        long,
        requires = "year",
        value_parser = clap::value_parser!(u32).range(1..=12)
    )]
    pub month: Option<u32>,

    /// Billing year, e.g. 2025.  Must be given together with `--month`.
    #[arg(short, long, requires = "month")]
    pub year: Option<i32>,

    /// Bill for the month before the current one.
    ///
    /// In January this selects December of the previous year.
    #[arg(long, conflicts_with_all = ["month", "year"])]
    pub previous_month: bool,
}

impl Cli {
    /// Reject pipeline flags given together with a subcommand.
    ///
    /// clap cannot express "conflicts with a subcommand" per flag, and
    /// `--config` has to stay usable with `init`, so the check runs after
    /// parsing.  The error renders and exits like any other usage error.
    pub fn check_subcommand_flags(&self) -> Result<(), clap::Error> {
        let Some(Subcommand::Init) = self.command else {
            return Ok(());
        };
        let pipeline_flags = [
            ("--print-config", self.print_config),
            ("--no-backup", self.no_backup),
            ("--no-script", self.no_script),
            ("--month", self.month.is_some()),
            ("--year", self.year.is_some()),
            ("--previous-month", self.previous_month),
        ];
        match pipeline_flags.iter().find(|(_, given)| *given) {
            Some((flag, _)) => Err(<Self as clap::CommandFactory>::command().error(
                clap::error::ErrorKind::ArgumentConflict,
                format!("'{flag}' cannot be used with 'init'"),
            )),
            None => Ok(()),
        }
    }
}

/// Explicit subcommands.  Running `billing-backup` with no subcommand
/// triggers the default pipeline.
#[derive(clap::Subcommand, Debug, PartialEq)]
pub enum Subcommand {
    /// Scaffold a `billing.toml` in the current directory.
    ///
    /// The generated file carries the default connection settings for the
    /// `horse_stable` database and points `[pipeline].workdir` at the current
    /// directory.  Exits with an error if the file already exists.
    Init,
}
