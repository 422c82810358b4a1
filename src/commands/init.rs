//! `billing-backup init` — scaffold a starter `billing.toml`.

use std::{fs::OpenOptions, io::Write, path::Path};

use anyhow::{Context, Result, bail};

use crate::{config::PASSWORD_ENV, ui::native_stage};

/// Write a commented default config to `path`.
///
/// Never overwrites: an existing file makes the command fail and is left
/// untouched.
pub fn run(path: &Path) -> Result<()> {
    let cwd = std::env::current_dir().context("resolving the current directory")?;

    let outcome = native_stage("Init", || scaffold(path, &cwd));
    outcome.print();
    if outcome.failed() {
        bail!("init failed");
    }
    Ok(())
}

fn scaffold(path: &Path, workdir: &Path) -> Result<String> {
    if path.exists() {
        bail!("{} already exists, refusing to overwrite", path.display());
    }

    // create_new closes the gap between the check above and the write.
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(render_template(workdir).as_bytes())
        .with_context(|| format!("writing {}", path.display()))?;

    Ok(path.display().to_string())
}

/// The starter config, with `[pipeline].workdir` set to `workdir`.
pub fn render_template(workdir: &Path) -> String {
    let workdir = toml::Value::String(workdir.to_string_lossy().into_owned());
    format!(
        r#"# billing-backup configuration.
#
# `billing-backup` dumps the database into [backup].dir, then writes
# [pipeline].script, which runs invoice generation followed by PDF rendering.

[database]
host     = "localhost"
port     = 3306
user     = "root"
# Leave empty and export {PASSWORD_ENV} instead of storing the password here.
password = ""
name     = "horse_stable"

[backup]
dir        = "backups"
tool       = "mysqldump"
extra_args = ["--single-transaction", "--routines", "--triggers"]

[pipeline]
script  = "run_billing.sh"
python  = "python3"
invoice = "invoice.py"
pdf     = "pdfs1.py"
workdir = {workdir}
"#
    )
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::config::{Config, default_extra_args};

    #[test]
    fn template_parses_to_defaults() {
        let cfg: Config = toml::from_str(&render_template(Path::new("/srv/billing"))).unwrap();
        assert_eq!(cfg.database.name, "horse_stable");
        assert!(cfg.database.password.is_empty());
        assert_eq!(cfg.backup.extra_args, default_extra_args());
        assert_eq!(cfg.pipeline.workdir.as_deref(), Some("/srv/billing"));
    }

    #[test]
    fn template_escapes_awkward_workdirs() {
        let odd = r#"/srv/"quoted" \ dir"#;
        let cfg: Config = toml::from_str(&render_template(Path::new(odd))).unwrap();
        assert_eq!(cfg.pipeline.workdir.as_deref(), Some(odd));
    }

    #[test]
    fn template_mentions_password_env() {
        assert!(render_template(Path::new("/x")).contains(PASSWORD_ENV));
    }

    #[test]
    fn scaffold_writes_new_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.toml");
        scaffold(&path, dir.path()).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[pipeline]"));
    }

    #[test]
    fn scaffold_refuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.toml");
        fs::write(&path, "# mine").unwrap();

        let err = scaffold(&path, dir.path()).unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "# mine");
    }
}
