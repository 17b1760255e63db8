//! Repair pass over a materialized tree.
//!
//! Walks every directory under the root, plans each one with
//! [`plan_repair_with_reserved`], and renames the malformed files in place.
//! Directories themselves are never renamed. A file that cannot be renamed is
//! reported and skipped. A second run over the result renames nothing.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use tracing::{debug, info, instrument, warn};
use walkdir::WalkDir;

use crate::core::repair::{RepairPlan, plan_repair_with_reserved};
use crate::core::sanitize::Sanitizer;

const WRITE_PROBE_NAME: &str = ".genloop-write-probe";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// `(old, new)` paths, in directory then name order.
    pub renamed: Vec<(PathBuf, PathBuf)>,
    /// Files whose names could not be recovered; left untouched.
    pub unresolved: Vec<PathBuf>,
    /// Paths the pass could not read or rename, with the reason. The pass
    /// continues past each one.
    pub failed: Vec<(PathBuf, String)>,
}

/// Fail unless `root` is an existing, writable directory.
pub fn ensure_writable_dir(root: &Path) -> Result<()> {
    let meta = match fs::metadata(root) {
        Ok(meta) => meta,
        Err(err) => {
            return Err(err).with_context(|| format!("directory {} not found", root.display()));
        }
    };
    if !meta.is_dir() {
        bail!("{} is not a directory", root.display());
    }
    let probe = root.join(WRITE_PROBE_NAME);
    fs::write(&probe, b"").with_context(|| format!("{} is not writable", root.display()))?;
    fs::remove_file(&probe).with_context(|| format!("remove probe {}", probe.display()))?;
    Ok(())
}

/// One line per rename (`renamed <old> -> <new>`), per unresolved file
/// (`unresolved <path>`) and per failure (`failed <path>: <reason>`),
/// followed by a summary line.
pub fn render_report(report: &RepairReport) -> String {
    let mut out = String::new();
    for (from, to) in &report.renamed {
        out.push_str(&format!("renamed {} -> {}\n", from.display(), to.display()));
    }
    for path in &report.unresolved {
        out.push_str(&format!("unresolved {}\n", path.display()));
    }
    for (path, reason) in &report.failed {
        out.push_str(&format!("failed {}: {}\n", path.display(), reason));
    }
    out.push_str(&format!(
        "{} renamed, {} unresolved, {} failed\n",
        report.renamed.len(),
        report.unresolved.len(),
        report.failed.len()
    ));
    out
}

/// Rename malformed files under `root`.
///
/// Only a bad `root` is an error. Anything that goes wrong below it lands in
/// [`RepairReport::failed`] and the walk moves on.
#[instrument(skip_all, fields(root = %root.display()))]
pub fn repair(root: &Path, sanitizer: &Sanitizer) -> Result<RepairReport> {
    ensure_writable_dir(root)?;

    let mut report = RepairReport::default();
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) if entry.file_type().is_dir() => dirs.push(entry.into_path()),
            Ok(_) => {}
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                warn!(path = %path.display(), err = %err, "walk failed");
                report.failed.push((path, err.to_string()));
            }
        }
    }

    for dir in dirs {
        if let Err(err) = repair_dir(&dir, sanitizer, &mut report) {
            warn!(dir = %dir.display(), err = %format!("{err:#}"), "directory skipped");
            report.failed.push((dir, format!("{err:#}")));
        }
    }
    info!(
        renamed = report.renamed.len(),
        unresolved = report.unresolved.len(),
        failed = report.failed.len(),
        "repair finished"
    );
    Ok(report)
}

/// Plan one directory and apply it. An `Err` means the directory listing
/// itself could not be read; per-file problems go into `report`.
fn repair_dir(dir: &Path, sanitizer: &Sanitizer, report: &mut RepairReport) -> Result<()> {
    let mut files = Vec::new();
    let mut reserved = BTreeSet::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", dir.display()))?;
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "non UTF-8 name left untouched");
            report.unresolved.push(entry.path());
            continue;
        };
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if file_type.is_file() {
            files.push(name);
        } else {
            reserved.insert(name);
        }
    }

    let plan = plan_repair_with_reserved(&files, &reserved, sanitizer);
    apply_plan(dir, &plan, report);
    Ok(())
}

fn apply_plan(dir: &Path, plan: &RepairPlan, report: &mut RepairReport) {
    for (old, new) in plan.renames() {
        let from = dir.join(old);
        let to = dir.join(new);
        match rename_file(&from, &to) {
            Ok(()) => {
                debug!(from = %from.display(), to = %to.display(), "renamed");
                report.renamed.push((from, to));
            }
            Err(err) => {
                warn!(path = %from.display(), err = %format!("{err:#}"), "rename failed");
                report.failed.push((from, format!("{err:#}")));
            }
        }
    }
    for name in plan.unresolved() {
        warn!(path = %dir.join(name).display(), "no recoverable name");
        report.unresolved.push(dir.join(name));
    }
}

fn rename_file(from: &Path, to: &Path) -> Result<()> {
    if to.exists() {
        bail!("refusing to overwrite {}", to.display());
    }
    fs::rename(from, to)
        .with_context(|| format!("rename {} to {}", from.display(), to.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn renames_malformed_files_across_directories() {
        let temp = tempfile::tempdir().expect("tempdir");
        let round = temp.path().join("round_1");
        fs::create_dir_all(&round).expect("mkdir");
        fs::write(round.join("`app.py`"), "print(1)").expect("write");
        fs::write(round.join("檔案：server.py"), "s").expect("write");
        fs::write(round.join("ok.js"), "j").expect("write");
        fs::write(temp.path().join("\"README.md\""), "r").expect("write");

        let report = repair(temp.path(), &Sanitizer::with_defaults()).expect("repair");
        assert_eq!(report.renamed.len(), 3);
        assert!(report.unresolved.is_empty());
        assert_eq!(
            file_names(&round),
            vec!["app.py".to_string(), "ok.js".to_string(), "server.py".to_string()]
        );
        assert_eq!(fs::read_to_string(round.join("app.py")).expect("read"), "print(1)");
        assert!(temp.path().join("README.md").exists());
    }

    #[test]
    fn second_run_renames_nothing() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::write(temp.path().join("`a.py`"), "a").expect("write");
        fs::write(temp.path().join("a.py"), "b").expect("write");
        fs::write(temp.path().join("just words"), "c").expect("write");

        let first = repair(temp.path(), &Sanitizer::with_defaults()).expect("first");
        assert_eq!(first.renamed.len(), 1);
        assert_eq!(first.unresolved, vec![temp.path().join("just words")]);

        let second = repair(temp.path(), &Sanitizer::with_defaults()).expect("second");
        assert!(second.renamed.is_empty());
        assert_eq!(second.unresolved, first.unresolved);
    }

    #[test]
    fn directories_are_not_renamed_and_reserve_their_names() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir(temp.path().join("main.py")).expect("mkdir");
        fs::write(temp.path().join("`main.py`"), "x").expect("write");

        let report = repair(temp.path(), &Sanitizer::with_defaults()).expect("repair");
        assert_eq!(
            report.renamed,
            vec![(
                temp.path().join("`main.py`"),
                temp.path().join("main_2.py")
            )]
        );
        assert!(temp.path().join("main.py").is_dir());
    }

    #[test]
    fn report_lists_renames_then_unresolved() {
        let report = RepairReport {
            renamed: vec![(PathBuf::from("d/`a.py`"), PathBuf::from("d/a.py"))],
            unresolved: vec![PathBuf::from("d/notes")],
            failed: vec![(PathBuf::from("d/`b.py`"), "permission denied".to_string())],
        };
        assert_eq!(
            render_report(&report),
            "renamed d/`a.py` -> d/a.py\nunresolved d/notes\nfailed d/`b.py`: permission denied\n1 renamed, 1 unresolved, 1 failed\n"
        );
    }

    #[test]
    fn failed_rename_is_reported_and_the_rest_still_apply() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        for name in ["`a.py`", "`b.py`", "`c.py`"] {
            fs::write(dir.join(name), name).expect("write");
        }
        let names = ["`a.py`", "`b.py`", "`c.py`"];
        let plan = plan_repair_with_reserved(&names, &BTreeSet::new(), &Sanitizer::with_defaults());
        // The file disappears between planning and applying.
        fs::remove_file(dir.join("`b.py`")).expect("remove");

        let mut report = RepairReport::default();
        apply_plan(dir, &plan, &mut report);
        assert_eq!(
            report.renamed,
            vec![
                (dir.join("`a.py`"), dir.join("a.py")),
                (dir.join("`c.py`"), dir.join("c.py")),
            ]
        );
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, dir.join("`b.py`"));
        assert!(dir.join("c.py").exists());
    }

    #[test]
    fn occupied_target_is_a_failure_not_an_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path();
        fs::write(dir.join("`a.py`"), "new").expect("write");
        let plan =
            plan_repair_with_reserved(&["`a.py`"], &BTreeSet::new(), &Sanitizer::with_defaults());
        fs::write(dir.join("a.py"), "existing").expect("write");

        let mut report = RepairReport::default();
        apply_plan(dir, &plan, &mut report);
        assert!(report.renamed.is_empty());
        assert!(report.failed[0].1.contains("refusing to overwrite"));
        assert_eq!(fs::read_to_string(dir.join("a.py")).expect("read"), "existing");
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_subdirectory_does_not_drop_earlier_renames() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempfile::tempdir().expect("tempdir");
        let a = temp.path().join("a");
        let b = temp.path().join("b");
        fs::create_dir_all(&a).expect("mkdir");
        fs::create_dir_all(&b).expect("mkdir");
        fs::write(a.join("`x.py`"), "x").expect("write");
        fs::write(b.join("`y.py`"), "y").expect("write");
        fs::set_permissions(&b, fs::Permissions::from_mode(0o000)).expect("chmod");

        let report = repair(temp.path(), &Sanitizer::with_defaults());
        fs::set_permissions(&b, fs::Permissions::from_mode(0o755)).expect("chmod back");

        let report = report.expect("repair keeps going");
        assert!(report.renamed.contains(&(a.join("`x.py`"), a.join("x.py"))));
        // Root ignores permission bits, in which case `b` is repaired too.
        if report.failed.is_empty() {
            assert!(b.join("y.py").exists());
        } else {
            assert!(report.failed.iter().any(|(path, _)| path.starts_with(&b)));
        }
    }

    #[test]
    fn missing_or_non_directory_root_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(repair(&temp.path().join("missing"), &Sanitizer::with_defaults()).is_err());
        let file = temp.path().join("file.txt");
        fs::write(&file, "x").expect("write");
        assert!(repair(&file, &Sanitizer::with_defaults()).is_err());
    }
}
