//! Terminal UI — spinners, stage banners, and captured command output.
//!
//! # Design goals
//!
//! - **Clean by default.** While the dump runs the user sees only a spinner and a short label.
//!   Raw dump tool output is captured and hidden.
//! - **Informative on failure.** If a stage exits non-zero its captured stdout *and* stderr are
//!   printed in full so the operator can diagnose the problem without re-running manually.
//! - **One shape for every stage.** External commands ([`run_stage`]) and in-process work
//!   ([`native_stage`]) both produce a [`StageOutcome`], so the pipeline treats them alike.
//!
//! # Typical usage
//!
//! ```no_run
//! use crate::ui::{run_stage, print_summary};
//!
//! let outcome = run_stage("Backup", &["mysqldump".into(), "horse_stable".into()], &[]);
//! outcome.print();
//! if outcome.failed() { std::process::exit(1); }
//! ```

use std::{
    process::{Command, Output, Stdio},
    time::Duration,
};

use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::runner::display_command;

// ─── Icons ───────────────────────────────────────────────────────────────────

/// Braille spinner frames — same style as indicatif's default.
static SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

fn icon_ok() -> console::StyledObject<&'static str> {
    style("✓").green().bold()
}
fn icon_err() -> console::StyledObject<&'static str> {
    style("✗").red().bold()
}
fn icon_skip() -> console::StyledObject<&'static str> {
    style("–").dim()
}
fn icon_done() -> console::StyledObject<&'static str> {
    style("✓").cyan().bold()
}

// ─── Stage result ─────────────────────────────────────────────────────────────

/// The outcome of a single pipeline stage.
#[derive(Debug)]
pub struct StageOutcome {
    /// Human-readable stage label, e.g. `"Backup"`.
    pub label: String,
    /// Whether the stage completed without error.
    pub success: bool,
    /// Set for stages that were not run at all.
    pub skipped: bool,
    /// Short note printed next to the label, e.g. the file a stage produced.
    pub detail: Option<String>,
    /// Everything the command wrote to stdout.
    pub stdout: String,
    /// Everything the command wrote to stderr.
    pub stderr: String,
    /// The error message, if any.
    pub error: Option<String>,
}

impl StageOutcome {
    fn ok(label: &str) -> Self {
        Self {
            label: label.to_string(),
            success: true,
            skipped: false,
            detail: None,
            stdout: String::new(),
            stderr: String::new(),
            error: None,
        }
    }

    fn err(label: &str, error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
            ..Self::ok(label)
        }
    }

    /// Attach a note shown after the label.
    #[must_use]
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Print the one-line summary (✓/✗/– + label) to stdout.
    ///
    /// On failure, also prints the captured stdout/stderr and the error
    /// message so the operator has everything they need without re-running.
    pub fn print(&self) {
        let detail = self
            .detail
            .as_deref()
            .map(|d| format!("  {}", style(d).dim()))
            .unwrap_or_default();

        if self.skipped {
            println!("  {}  {}{detail}", icon_skip(), style(&self.label).dim());
        } else if self.success {
            println!("  {}  {}{detail}", icon_ok(), style(&self.label).bold());
        } else {
            println!("  {}  {}{detail}", icon_err(), style(&self.label).bold());

            if let Some(ref msg) = self.error {
                eprintln!();
                eprintln!("  {} {}", style("Error:").red().bold(), msg);
            }

            if !self.stdout.is_empty() {
                eprintln!();
                eprintln!("  {} stdout:", style("►").dim());
                for line in self.stdout.lines() {
                    eprintln!("    {line}");
                }
            }
            if !self.stderr.is_empty() {
                eprintln!();
                eprintln!("  {} stderr:", style("►").dim());
                for line in self.stderr.lines() {
                    eprintln!("    {line}");
                }
            }
        }
    }

    /// Returns `true` if the stage did not succeed.
    pub const fn failed(&self) -> bool {
        !self.success
    }
}

// ─── Spinner ──────────────────────────────────────────────────────────────────

/// Create and start an indeterminate spinner for `label`.
fn make_spinner(label: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    // The template is a literal; fall back to the default style rather than
    // failing a run over cosmetics.
    let spinner_style = ProgressStyle::with_template("  {spinner:.cyan}  {msg}")
        .map_or_else(|_| ProgressStyle::default_spinner(), |s| s.tick_chars(SPINNER_CHARS));
    pb.set_style(spinner_style);
    pb.set_message(format!("{}", style(label).dim()));
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

// ─── Captured execution ───────────────────────────────────────────────────────

/// Run a command, capturing both stdout and stderr.
///
/// `env` is added to the inherited environment of the child only; secrets
/// passed this way never show up in `ps`.
///
/// Returns `(success, stdout_text, stderr_text)`.
pub fn run_captured(args: &[String], env: &[(String, String)]) -> Result<(bool, String, String)> {
    let (prog, rest) = args.split_first().context("cannot run an empty command")?;

    let output: Output = Command::new(prog)
        .args(rest)
        .envs(env.iter().map(|(k, v)| (k, v)))
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .with_context(|| format!("failed to spawn: {}", display_command(args)))?;

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

    Ok((output.status.success(), stdout, stderr))
}

// ─── High-level stage runners ─────────────────────────────────────────────────

/// Run an external command behind a spinner, returning a [`StageOutcome`].
///
/// The spinner is cleared before the outcome line is printed, so the terminal
/// always shows a clean, static summary when the stage finishes.
pub fn run_stage(label: &str, args: &[String], env: &[(String, String)]) -> StageOutcome {
    let spinner = make_spinner(label);

    let result = run_captured(args, env);
    spinner.finish_and_clear();

    match result {
        Ok((success, stdout, stderr)) => {
            let mut outcome = if success {
                StageOutcome::ok(label)
            } else {
                StageOutcome::err(
                    label,
                    format!("command exited non-zero: {}", display_command(args)),
                )
            };
            outcome.stdout = stdout;
            outcome.stderr = stderr;
            outcome
        },
        Err(e) => StageOutcome::err(label, format!("{e:#}")),
    }
}

/// Run in-process work as a stage.  `Ok(detail)` becomes a success carrying
/// `detail`; an error becomes a failure with the full context chain.
pub fn native_stage(label: &str, work: impl FnOnce() -> Result<String>) -> StageOutcome {
    match work() {
        Ok(detail) => StageOutcome::ok(label).with_detail(detail),
        Err(e) => StageOutcome::err(label, format!("{e:#}")),
    }
}

/// A stage that was deliberately not run, e.g. because of `--no-backup`.
pub fn skipped_stage(label: &str, reason: &str) -> StageOutcome {
    StageOutcome {
        skipped: true,
        ..StageOutcome::ok(label)
    }
    .with_detail(reason)
}

// ─── Summary banner ───────────────────────────────────────────────────────────

/// Print the final summary after the pipeline stopped.
///
/// Shows a success banner when all stages passed, or a failure banner listing
/// the stages that failed.
pub fn print_summary(outcomes: &[StageOutcome]) {
    let failed: Vec<&StageOutcome> = outcomes.iter().filter(|o| o.failed()).collect();
    println!();
    if failed.is_empty() {
        println!(
            "  {} {}",
            icon_done(),
            style("All stages completed successfully.").cyan().bold()
        );
    } else {
        eprintln!("  {}  {}", icon_err(), style("Billing run failed.").red().bold());
        for o in &failed {
            eprintln!("    {} {}", icon_err(), style(&o.label).red());
        }
    }
    println!();
}

// ─── Tests ────────────────────────────────────────────────────────────────────
