//! Default pipeline — runs when no subcommand is given.
//!
//! # Pipeline stages (in order)
//!
//! | # | Stage    | Flag to skip   | Description                                  |
//! |---|----------|----------------|----------------------------------------------|
//! | 1 | Prepare  | `--no-backup`  | Create the backup directory, reserve the dump file |
//! | 2 | Backup   | `--no-backup`  | Dump the database to the reserved file       |
//! | 3 | Script   | `--no-script`  | Write the executable billing run script      |
//!
//! The first failing stage aborts the run: later stages are not attempted,
//! the summary is printed and the process exits non-zero.
//!
//! ## Dump file names
//!
//! Names carry a one-second timestamp.  Prepare creates the file with
//! `create_new`, moving on to `_1`, `_2`, … when an earlier run in the same
//! second already holds the name.  A failed dump only ever removes the file
//! this run reserved.

use std::{
    fs::{self, OpenOptions},
    io::ErrorKind,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDateTime};
use console::style;
use indicatif::HumanBytes;

use crate::{
    cli::Cli,
    config::{Config, PipelineConfig, expand_home},
    period::BillingPeriod,
    runner::{backup_file_path, display_command, dump_command, dump_env},
    script,
    ui::{StageOutcome, native_stage, print_summary, run_stage, skipped_stage},
};

/// Suffixes tried before giving up on finding a free dump file name.
const MAX_SAME_SECOND_RUNS: u32 = 100;

// ─── Entry point ──────────────────────────────────────────────────────────────

/// Execute the pipeline.
pub fn run(cli: &Cli, cfg: &Config) -> Result<()> {
    run_at(cli, cfg, Local::now().naive_local())
}

/// The pipeline with the clock fixed at `now`.
fn run_at(cli: &Cli, cfg: &Config, now: NaiveDateTime) -> Result<()> {
    let period = BillingPeriod::resolve(cli.month, cli.year, cli.previous_month, now.date())?;

    println!();
    println!("  {} {}", style("Billing period").bold(), style(period).cyan());
    println!();

    let mut outcomes: Vec<StageOutcome> = Vec::new();

    if cli.no_backup {
        record(&mut outcomes, skipped_stage("Backup", "--no-backup"));
    } else {
        let dir = cfg.backup.dir_path();

        // 1. Prepare
        let mut reserved: Option<PathBuf> = None;
        let prepare = native_stage("Prepare", || {
            ensure_backup_dir(&dir)?;
            reserved = Some(reserve_backup_file(&dir, &cfg.database.name, now)?);
            Ok(dir.display().to_string())
        });
        if record(&mut outcomes, prepare) {
            print_summary(&outcomes);
            bail!("billing run aborted: could not prepare the backup directory");
        }
        let file = reserved.context("no dump file was reserved")?;

        // 2. Backup
        let args = dump_command(cfg, &file);
        let mut dump = run_stage("Backup", &args, &dump_env(cfg));
        if dump.failed() {
            discard_partial(&file);
        } else {
            dump = dump.with_detail(describe_dump(&file));
        }
        if record(&mut outcomes, dump) {
            print_summary(&outcomes);
            bail!("billing run aborted: {} failed", display_command(&args[..1]));
        }
    }

    // 3. Script
    if cli.no_script {
        record(&mut outcomes, skipped_stage("Script", "--no-script"));
    } else {
        let stage = native_stage("Script", || {
            let workdir = resolve_workdir(&cfg.pipeline)?;
            let path = cfg.pipeline.script_path();
            let body = script::render(&cfg.pipeline, period, now, &workdir);
            script::write_executable(&path, &body)?;
            Ok(path.display().to_string())
        });
        if record(&mut outcomes, stage) {
            print_summary(&outcomes);
            bail!("billing run aborted: could not write billing script");
        }
    }

    print_summary(&outcomes);
    Ok(())
}

/// Print `outcome`, keep it for the summary and report whether it failed.
fn record(outcomes: &mut Vec<StageOutcome>, outcome: StageOutcome) -> bool {
    outcome.print();
    let failed = outcome.failed();
    outcomes.push(outcome);
    failed
}

// ─── Stage helpers ────────────────────────────────────────────────────────────

fn ensure_backup_dir(dir: &Path) -> Result<String> {
    fs::create_dir_all(dir).with_context(|| format!("mkdir -p {}", dir.display()))?;
    Ok(dir.display().to_string())
}

/// Create the first free dump file name for `at` and return its path.
///
/// The file is created empty; the dump tool overwrites it.  Creating it here
/// means a concurrent or same-second run can never pick the same name.
fn reserve_backup_file(dir: &Path, database: &str, at: NaiveDateTime) -> Result<PathBuf> {
    for attempt in 0..MAX_SAME_SECOND_RUNS {
        let candidate = backup_file_path(dir, database, at, attempt);
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {},
            Err(e) => {
                return Err(e).with_context(|| format!("creating {}", candidate.display()));
            },
        }
    }
    bail!(
        "no free dump file name in {} after {MAX_SAME_SECOND_RUNS} attempts",
        dir.display()
    )
}

/// `path (size)`, or just the path if the tool left nothing to stat.
fn describe_dump(file: &Path) -> String {
    match fs::metadata(file) {
        Ok(meta) => format!("{} ({})", file.display(), HumanBytes(meta.len())),
        Err(_) => file.display().to_string(),
    }
}

/// Remove the half-written dump reserved by this run so a failed run leaves
/// no file behind that looks like a usable backup.  Only ever called with a
/// path from [`reserve_backup_file`].
fn discard_partial(file: &Path) {
    if !file.exists() {
        return;
    }
    if let Err(e) = fs::remove_file(file) {
        eprintln!(
            "Warning: could not remove partial dump '{}': {e}",
            file.display()
        );
    }
}

/// The directory the billing script `cd`s into.
fn resolve_workdir(pipeline: &PipelineConfig) -> Result<PathBuf> {
    match pipeline.workdir.as_deref() {
        Some(dir) => Ok(expand_home(dir)),
        None => std::env::current_dir().context("resolving the current directory"),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::config::{BackupConfig, DatabaseConfig};

    fn make_cli(extra: &[&str]) -> Cli {
        Cli::parse_from(std::iter::once("billing-backup").chain(extra.iter().copied()))
    }

    /// Config rooted in `root`, using `tool` (with `extra_args`) as the dump
    /// tool.
    fn make_cfg(root: &Path, tool: &str, extra_args: &[&str]) -> Config {
        Config {
            database: DatabaseConfig::default(),
            backup: BackupConfig {
                dir: root.join("backups").display().to_string(),
                tool: tool.into(),
                extra_args: extra_args.iter().map(ToString::to_string).collect(),
            },
            pipeline: PipelineConfig {
                script: root.join("run_billing.sh").display().to_string(),
                workdir: Some(root.display().to_string()),
                ..PipelineConfig::default()
            },
        }
    }

    fn at() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 3, 31)
            .unwrap()
            .and_hms_opt(23, 5, 9)
            .unwrap()
    }

    fn files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .map(|rd| rd.flatten().map(|e| e.path()).collect())
            .unwrap_or_default()
    }

    // ── helpers ───────────────────────────────────────────────────────────────

    #[test]
    fn ensure_backup_dir_creates_nested_dirs() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("a").join("b");
        ensure_backup_dir(&dir).unwrap();
        assert!(dir.is_dir());
    }

    #[test]
    fn ensure_backup_dir_is_idempotent() {
        let root = tempfile::tempdir().unwrap();
        ensure_backup_dir(root.path()).unwrap();
        ensure_backup_dir(root.path()).unwrap();
    }

    #[test]
    fn ensure_backup_dir_fails_when_path_is_a_file() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("backups");
        fs::write(&file, "").unwrap();
        assert!(ensure_backup_dir(&file).is_err());
    }

    #[test]
    fn discard_partial_removes_file_and_tolerates_absence() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("partial.sql");
        fs::write(&file, "-- half a dump").unwrap();
        discard_partial(&file);
        assert!(!file.exists());
        discard_partial(&file);
    }

    #[test]
    fn describe_dump_includes_size() {
        let root = tempfile::tempdir().unwrap();
        let file = root.path().join("d.sql");
        fs::write(&file, "x".repeat(2048)).unwrap();
        assert!(describe_dump(&file).ends_with("(2.00 KiB)"));
    }

    #[test]
    fn resolve_workdir_prefers_config() {
        let p = PipelineConfig {
            workdir: Some("/srv/billing".into()),
            ..PipelineConfig::default()
        };
        assert_eq!(resolve_workdir(&p).unwrap(), PathBuf::from("/srv/billing"));
    }

    #[test]
    fn resolve_workdir_defaults_to_cwd() {
        let got = resolve_workdir(&PipelineConfig::default()).unwrap();
        assert_eq!(got, std::env::current_dir().unwrap());
    }

    // ── pipeline ──────────────────────────────────────────────────────────────

    #[test]
    fn successful_run_writes_dump_and_script() {
        let root = tempfile::tempdir().unwrap();
        let fake = r#"for a in "$@"; do case "$a" in --result-file=*) f="${a#--result-file=}";; esac; done; echo "-- dump" > "$f""#;
        let cfg = make_cfg(root.path(), "sh", &["-c", fake, "mysqldump"]);

        run(&make_cli(&["--month", "3", "--year", "2025"]), &cfg).unwrap();

        let dumps = files_in(&root.path().join("backups"));
        assert_eq!(dumps.len(), 1);
        let name = dumps[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("horse_stable_") && name.ends_with(".sql"));

        let body = fs::read_to_string(root.path().join("run_billing.sh")).unwrap();
        assert!(body.contains("python3 invoice.py --month 3 --year 2025"));
    }

    #[test]
    fn failed_dump_aborts_before_script() {
        let root = tempfile::tempdir().unwrap();
        let fake = r#"for a in "$@"; do case "$a" in --result-file=*) f="${a#--result-file=}";; esac; done; echo partial > "$f"; exit 2"#;
        let cfg = make_cfg(root.path(), "sh", &["-c", fake, "mysqldump"]);

        let result = run(&make_cli(&[]), &cfg);
        assert!(result.is_err());
        assert!(files_in(&root.path().join("backups")).is_empty());
        assert!(!root.path().join("run_billing.sh").exists());
    }

    #[test]
    fn failed_dump_keeps_earlier_dump_from_same_second() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("backups");
        fs::create_dir_all(&dir).unwrap();
        let good = backup_file_path(&dir, "horse_stable", at(), 0);
        fs::write(&good, "-- good dump").unwrap();

        let fake = r#"for a in "$@"; do case "$a" in --result-file=*) f="${a#--result-file=}";; esac; done; echo partial > "$f"; exit 2"#;
        let cfg = make_cfg(root.path(), "sh", &["-c", fake, "mysqldump"]);

        assert!(run_at(&make_cli(&["--no-script"]), &cfg, at()).is_err());
        assert_eq!(fs::read_to_string(&good).unwrap(), "-- good dump");
        assert_eq!(files_in(&dir), vec![good]);
    }

    #[test]
    fn same_second_run_dumps_to_suffixed_file() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("backups");
        fs::create_dir_all(&dir).unwrap();
        let earlier = backup_file_path(&dir, "horse_stable", at(), 0);
        fs::write(&earlier, "-- earlier").unwrap();

        let fake = r#"for a in "$@"; do case "$a" in --result-file=*) f="${a#--result-file=}";; esac; done; echo "-- later" > "$f""#;
        let cfg = make_cfg(root.path(), "sh", &["-c", fake, "mysqldump"]);

        run_at(&make_cli(&["--no-script"]), &cfg, at()).unwrap();

        assert_eq!(fs::read_to_string(&earlier).unwrap(), "-- earlier");
        let later = dir.join("horse_stable_20250331_230509_1.sql");
        assert_eq!(fs::read_to_string(later).unwrap(), "-- later\n");
        assert_eq!(files_in(&dir).len(), 2);
    }

    #[test]
    fn reserve_backup_file_skips_taken_names() {
        let root = tempfile::tempdir().unwrap();
        for attempt in 0..2 {
            fs::write(backup_file_path(root.path(), "db", at(), attempt), "").unwrap();
        }
        let got = reserve_backup_file(root.path(), "db", at()).unwrap();
        assert_eq!(got, backup_file_path(root.path(), "db", at(), 2));
        assert!(got.exists());
    }

    #[test]
    fn prepare_failure_aborts_before_dump_and_script() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("backups"), "not a directory").unwrap();
        let marker = root.path().join("dump-ran");
        let fake = format!("touch '{}'", marker.display());
        let cfg = make_cfg(root.path(), "sh", &["-c", &fake, "mysqldump"]);

        let result = run_at(&make_cli(&[]), &cfg, at());

        assert!(result.is_err());
        assert!(!marker.exists());
        assert!(!root.path().join("run_billing.sh").exists());
    }

    #[test]
    fn no_backup_only_writes_script() {
        let root = tempfile::tempdir().unwrap();
        let cfg = make_cfg(root.path(), "false", &[]);

        run(&make_cli(&["--no-backup"]), &cfg).unwrap();

        assert!(!root.path().join("backups").exists());
        assert!(root.path().join("run_billing.sh").exists());
    }

    #[test]
    fn no_script_only_dumps() {
        let root = tempfile::tempdir().unwrap();
        let cfg = make_cfg(root.path(), "true", &[]);

        run(&make_cli(&["--no-script"]), &cfg).unwrap();

        assert!(root.path().join("backups").is_dir());
        assert!(!root.path().join("run_billing.sh").exists());
    }
}
