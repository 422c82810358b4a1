//! Configuration types and loading logic.
//!
//! `Config` is a direct 1-to-1 mapping of `billing.toml`.  Every field has a
//! default so the file is entirely optional: running `billing-backup` without
//! any config file dumps `horse_stable` on `localhost` into `./backups` and
//! writes `./run_billing.sh`.
//!
//! # File format
//!
//! ```toml
//! [database]
//! host     = "localhost"
//! port     = 3306
//! user     = "root"
//! password = ""              # BILLING_DB_PASSWORD overrides this
//! name     = "horse_stable"
//!
//! [backup]
//! dir        = "backups"
//! tool       = "mysqldump"
//! extra_args = ["--single-transaction", "--routines", "--triggers"]
//!
//! [pipeline]
//! script  = "run_billing.sh"
//! python  = "python3"
//! invoice = "invoice.py"
//! pdf     = "pdfs1.py"
//! workdir = "/srv/billing"   # optional; defaults to the current directory
//! ```
//!
//! # Layering
//!
//! `main` reads two files, a global one under the user's config directory and
//! the local `--config` file, as [`PartialConfig`]s.  They are merged table by
//! table (local wins) and only then deserialised into a [`Config`].

use std::{
    fmt,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable that replaces `[database].password` when set.
pub const PASSWORD_ENV: &str = "BILLING_DB_PASSWORD";

// ─── Top-level ────────────────────────────────────────────────────────────────

/// Root configuration object, deserialised from `billing.toml`.
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    /// Connection settings handed to the dump tool.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Where dumps go and which tool produces them.
    #[serde(default)]
    pub backup: BackupConfig,

    /// Steps chained together by the generated billing script.
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

// ─── [database] ───────────────────────────────────────────────────────────────

/// MySQL connection settings.
#[derive(Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,

    /// Empty means "no `--password` flag"; the dump tool then falls back to
    /// its own option files.  Prefer [`PASSWORD_ENV`] over storing a real
    /// password here.
    pub password: String,

    /// Schema to dump.
    pub name: String,
}

impl DatabaseConfig {
    /// Replace the configured password with `password` when one is given.
    pub fn override_password(&mut self, password: Option<String>) {
        if let Some(pw) = password {
            self.password = pw;
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 3306,
            user: "root".into(),
            password: String::new(),
            name: "horse_stable".into(),
        }
    }
}

// `--print-config` goes through Debug, so the password never does.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let password = if self.password.is_empty() { "" } else { "***" };
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &password)
            .field("name", &self.name)
            .finish()
    }
}

// ─── [backup] ─────────────────────────────────────────────────────────────────

/// Dump destination and tool.
#[derive(Debug, Deserialize, Serialize)]
pub struct BackupConfig {
    /// Directory that receives the timestamped `.sql` files.  Created on
    /// demand; a leading `~/` is expanded to the home directory.
    #[serde(default = "default_backup_dir")]
    pub dir: String,

    /// Dump executable, looked up on `PATH` unless it contains a slash.
    #[serde(default = "default_tool")]
    pub tool: String,

    /// Flags placed directly after the tool name, before the connection
    /// flags.
    #[serde(default = "default_extra_args")]
    pub extra_args: Vec<String>,
}

impl BackupConfig {
    pub fn dir_path(&self) -> PathBuf {
        expand_home(&self.dir)
    }
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            dir: default_backup_dir(),
            tool: default_tool(),
            extra_args: default_extra_args(),
        }
    }
}

// ─── [pipeline] ───────────────────────────────────────────────────────────────

/// What the generated billing script runs.
#[derive(Debug, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Where the script is written.
    #[serde(default = "default_script")]
    pub script: String,

    /// Interpreter used for both steps.
    #[serde(default = "default_python")]
    pub python: String,

    /// Invoice-data generation step.
    #[serde(default = "default_invoice")]
    pub invoice: String,

    /// PDF rendering step.
    #[serde(default = "default_pdf")]
    pub pdf: String,

    /// Directory the script changes into before running anything.  Defaults
    /// to the directory `billing-backup` was started from.
    #[serde(default)]
    pub workdir: Option<String>,
}

impl PipelineConfig {
    pub fn script_path(&self) -> PathBuf {
        expand_home(&self.script)
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            script: default_script(),
            python: default_python(),
            invoice: default_invoice(),
            pdf: default_pdf(),
            workdir: None,
        }
    }
}

// ─── Defaults ─────────────────────────────────────────────────────────────────

// Free functions for `#[serde(default = "…")]`.

pub fn default_backup_dir() -> String {
    "backups".into()
}

pub fn default_tool() -> String {
    "mysqldump".into()
}

pub fn default_extra_args() -> Vec<String> {
    vec![
        "--single-transaction".into(),
        "--routines".into(),
        "--triggers".into(),
    ]
}

pub fn default_script() -> String {
    "run_billing.sh".into()
}

pub fn default_python() -> String {
    "python3".into()
}

pub fn default_invoice() -> String {
    "invoice.py".into()
}

pub fn default_pdf() -> String {
    "pdfs1.py".into()
}

/// Expand a leading `~` or `~/` to the user's home directory.
///
/// Paths without that prefix, and every path on systems without a home
/// directory, are returned unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map_or_else(|| PathBuf::from(path), |h| h.join(rest)),
        None if path == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// ─── Partial configs ──────────────────────────────────────────────────────────

/// One configuration source before merging, kept as a raw TOML table so a
/// field is only overridden when the file actually sets it.
#[derive(Debug, Default, Clone)]
pub struct PartialConfig(toml::Table);

impl PartialConfig {
    /// Overlay `local` on top of `self`.  Nested tables merge key by key;
    /// everything else (including arrays) is replaced wholesale.
    #[must_use]
    pub fn merge(mut self, local: Self) -> Self {
        merge_tables(&mut self.0, local.0);
        self
    }

    /// Deserialise the merged table, filling unset fields with defaults.
    pub fn resolve(self) -> Result<Config> {
        toml::Value::Table(self.0)
            .try_into()
            .context("invalid configuration")
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        let replacement = match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
                None
            },
            (_, value) => Some(value),
        };
        if let Some(value) = replacement {
            base.insert(key, value);
        }
    }
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Read `path` as a [`PartialConfig`].
///
/// Returns `Ok(None)` when the file does not exist, and an error if it exists
/// but cannot be read or is not valid TOML.
pub fn parse_partial(path: &Path) -> Result<Option<PartialConfig>> {
    if !path.exists() {
        return Ok(None);
    }

    let text =
        std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let table: toml::Table =
        toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;

    Ok(Some(PartialConfig(table)))
}

// ─── Tests ────────────────────────────────────────────────────────────────────
