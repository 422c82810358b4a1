//! The generated billing script.
//!
//! The script is a fixed bash template.  Only the interpreter, step paths,
//! working directory and billing period are interpolated; each is
//! shell-quoted when it needs to be.  `set -euo pipefail` makes the PDF step
//! run only after invoice generation succeeded.

use std::{fmt::Write as _, fs, path::Path};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;

use crate::{config::PipelineConfig, period::BillingPeriod};

/// Render the billing script for `period`.
pub fn render(
    pipeline: &PipelineConfig,
    period: BillingPeriod,
    generated_at: NaiveDateTime,
    workdir: &Path,
) -> String {
    let python = shell_quote(&pipeline.python);
    let step_args = format!("--month {} --year {}", period.month, period.year);

    let mut s = String::new();
    s.push_str("#!/usr/bin/env bash\n");
    let _ = writeln!(
        s,
        "# Billing run for {period}, generated {} by billing-backup.",
        generated_at.format("%Y-%m-%d %H:%M:%S")
    );
    s.push_str("set -euo pipefail\n\n");
    let _ = writeln!(s, "cd {}\n", shell_quote(&workdir.to_string_lossy()));
    let _ = writeln!(s, "echo \"==> Generating invoice data for {period}\"");
    let _ = writeln!(s, "{python} {} {step_args}\n", shell_quote(&pipeline.invoice));
    let _ = writeln!(s, "echo \"==> Rendering PDF invoices for {period}\"");
    let _ = writeln!(s, "{python} {} {step_args}\n", shell_quote(&pipeline.pdf));
    let _ = writeln!(s, "echo \"==> Billing run for {period} complete\"");
    s
}

/// Write `body` to `path` and mark it executable (`0o755`).
///
/// Parent directories are created as needed and an existing file is
/// replaced.
pub fn write_executable(path: &Path, body: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    fs::write(path, body).with_context(|| format!("writing {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))
            .with_context(|| format!("chmod 755 {}", path.display()))?;
    }

    Ok(())
}

/// Quote `word` for a POSIX shell, leaving it bare when that is safe.
pub fn shell_quote(word: &str) -> String {
    let safe = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:@%+,".contains(c));
    if safe {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}
