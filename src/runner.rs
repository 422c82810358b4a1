//! Dump command construction helpers.
//!
//! This module is responsible for *building* the argument list and
//! environment passed to the dump tool.  It deliberately does **not** execute
//! anything; process execution lives in [`crate::ui`] so that the spinner can
//! own the terminal while the command runs.
//!
//! # Flag order
//!
//! ```text
//! <tool>  <extra_args…>  --host=…  --port=…  --user=…  --result-file=<file>  <database>
//! ```
//!
//! `extra_args` come first so a wrapper such as `sh -c '…' mysqldump` can be
//! configured as the tool and still receive the connection flags as
//! positional arguments.
//!
//! # Password
//!
//! The password never goes on the command line, where `ps` would show it to
//! every local user.  It is handed to the child as `MYSQL_PWD` instead.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use crate::config::Config;

const PASSWORD_FLAG: &str = "--password=";

/// Environment variable mysqldump reads its password from.
pub const PASSWORD_VAR: &str = "MYSQL_PWD";

/// Timestamp embedded in dump file names, e.g. `20251019_183605`.
pub const FILE_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

// ─── Paths ────────────────────────────────────────────────────────────────────

/// `<dir>/<database>_<YYYYMMDD_HHMMSS>.sql` for `attempt == 0`, and
/// `<dir>/<database>_<YYYYMMDD_HHMMSS>_<attempt>.sql` after that.
///
/// Later attempts exist for runs that start within the same second as an
/// earlier one.
pub fn backup_file_path(dir: &Path, database: &str, at: NaiveDateTime, attempt: u32) -> PathBuf {
    let stamp = at.format(FILE_TIMESTAMP);
    if attempt == 0 {
        dir.join(format!("{database}_{stamp}.sql"))
    } else {
        dir.join(format!("{database}_{stamp}_{attempt}.sql"))
    }
}

// ─── Dump command ─────────────────────────────────────────────────────────────

/// Builds the full dump invocation writing to `file`.
pub fn dump_command(cfg: &Config, file: &Path) -> Vec<String> {
    let db = &cfg.database;
    let mut cmd: Vec<String> = vec![cfg.backup.tool.clone()];
    cmd.extend(cfg.backup.extra_args.iter().cloned());
    cmd.extend([
        format!("--host={}", db.host),
        format!("--port={}", db.port),
        format!("--user={}", db.user),
        format!("--result-file={}", file.display()),
    ]);
    cmd.push(db.name.clone());
    cmd
}

/// Extra environment for the dump tool.
///
/// Empty when no password is configured, so the tool can fall back to
/// `~/.my.cnf` or an inherited `MYSQL_PWD`.
pub fn dump_env(cfg: &Config) -> Vec<(String, String)> {
    if cfg.database.password.is_empty() {
        vec![]
    } else {
        vec![(PASSWORD_VAR.into(), cfg.database.password.clone())]
    }
}

/// Render `args` for messages.  A `--password=` smuggled in through
/// `extra_args` is masked.
pub fn display_command(args: &[String]) -> String {
    args.iter()
        .map(|a| {
            if a.starts_with(PASSWORD_FLAG) {
                format!("{PASSWORD_FLAG}***")
            } else {
                a.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// ─── Tests ────────────────────────────────────────────────────────────────────
