//! Version materializer: one directory per round plus the `final/` snapshot.
//!
//! Names are resolved before anything here runs, so the set of paths a round
//! writes is fixed up front and worker scheduling cannot change it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, info, instrument, warn};

use crate::core::error::WriteFailure;
use crate::core::history::FINAL_DIR_NAME;
use crate::core::types::SanitizedFile;

const STAGING_DIR_NAME: &str = ".final.staging";

/// Suffix of in-flight temp files. `~` is outside the sanitized name alphabet,
/// so a temp path never equals another file of the round.
const TEMP_SUFFIX: &str = "~tmp";

/// Outcome of writing one round directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundReport {
    pub round: u32,
    pub dir: PathBuf,
    /// Names written successfully, in region order.
    pub written: Vec<String>,
    pub failures: Vec<WriteFailure>,
}

/// The snapshot produced by [`finalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    /// Round the files were copied from.
    pub round: u32,
    pub dir: PathBuf,
    pub files: Vec<String>,
}

/// Write `files` into `round_dir`.
///
/// The directory is created if needed; an existing non-empty directory is
/// refused. Each file is written to a temporary sibling and renamed into
/// place by up to `workers` scoped threads. A failed file becomes a
/// [`WriteFailure`] in the report and does not stop its siblings.
#[instrument(skip_all, fields(round = round, dir = %round_dir.display(), files = files.len()))]
pub fn materialize(
    round_dir: &Path,
    round: u32,
    files: &[SanitizedFile],
    workers: usize,
) -> Result<RoundReport> {
    if round_dir.exists() {
        let mut entries = fs::read_dir(round_dir)
            .with_context(|| format!("read round dir {}", round_dir.display()))?;
        if entries.next().is_some() {
            bail!("round directory {} is not empty", round_dir.display());
        }
    }
    fs::create_dir_all(round_dir)
        .with_context(|| format!("create round dir {}", round_dir.display()))?;

    let outcomes = write_all(round_dir, files, workers.max(1));

    let mut written = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for (file, outcome) in files.iter().zip(outcomes) {
        match outcome {
            Ok(()) => written.push(file.name.clone()),
            Err(err) => {
                warn!(round, name = %file.name, err = %format!("{err:#}"), "write failed");
                failures.push(WriteFailure {
                    name: file.name.clone(),
                    reason: format!("{err:#}"),
                });
            }
        }
    }
    info!(round, written = written.len(), failed = failures.len(), "round materialized");
    Ok(RoundReport {
        round,
        dir: round_dir.to_path_buf(),
        written,
        failures,
    })
}

/// Results are returned in the order of `files`.
fn write_all(dir: &Path, files: &[SanitizedFile], workers: usize) -> Vec<Result<()>> {
    let next = AtomicUsize::new(0);
    let mut slots: Vec<Option<Result<()>>> = files.iter().map(|_| None).collect();

    let finished: Vec<(usize, Result<()>)> = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers.min(files.len()))
            .map(|_| {
                scope.spawn(|| {
                    let mut done = Vec::new();
                    loop {
                        let idx = next.fetch_add(1, Ordering::Relaxed);
                        let Some(file) = files.get(idx) else {
                            break;
                        };
                        done.push((idx, write_atomic(dir, &file.name, file.content.as_bytes())));
                    }
                    done
                })
            })
            .collect();
        handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap_or_default())
            .collect()
    });

    for (idx, outcome) in finished {
        slots[idx] = Some(outcome);
    }
    slots
        .into_iter()
        .map(|slot| slot.unwrap_or_else(|| Err(anyhow!("writer thread panicked"))))
        .collect()
}

fn write_atomic(dir: &Path, name: &str, contents: &[u8]) -> Result<()> {
    let path = dir.join(name);
    let tmp_path = dir.join(temp_name(name));
    if let Err(err) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("write temp file {}", tmp_path.display()));
    }
    if let Err(err) = fs::rename(&tmp_path, &path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("rename into {}", path.display()));
    }
    debug!(path = %path.display(), bytes = contents.len(), "file written");
    Ok(())
}

fn temp_name(name: &str) -> String {
    format!(".{name}{TEMP_SUFFIX}")
}

/// Copy the last of `round_dirs` into `<project_root>/final/`.
///
/// `round_dirs` must be ordered by round. The copy is staged in a sibling
/// directory and renamed into place, replacing any earlier `final/`. Returns
/// `None` when there is no round to copy.
#[instrument(skip_all, fields(root = %project_root.display(), rounds = round_dirs.len()))]
pub fn finalize(round_dirs: &[(u32, PathBuf)], project_root: &Path) -> Result<Option<Finalized>> {
    let Some((round, source)) = round_dirs.last() else {
        debug!("no completed round to finalize");
        return Ok(None);
    };

    let staging = project_root.join(STAGING_DIR_NAME);
    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("remove stale staging dir {}", staging.display()))?;
    }
    fs::create_dir_all(&staging)
        .with_context(|| format!("create staging dir {}", staging.display()))?;

    let mut files = Vec::new();
    for entry in
        fs::read_dir(source).with_context(|| format!("read round dir {}", source.display()))?
    {
        let entry = entry.with_context(|| format!("read entry in {}", source.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if !file_type.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            warn!(path = %entry.path().display(), "skipping non UTF-8 file name");
            continue;
        };
        fs::copy(entry.path(), staging.join(&name))
            .with_context(|| format!("copy {} into final", entry.path().display()))?;
        files.push(name);
    }
    files.sort();

    let final_dir = project_root.join(FINAL_DIR_NAME);
    if final_dir.exists() {
        fs::remove_dir_all(&final_dir)
            .with_context(|| format!("remove previous {}", final_dir.display()))?;
    }
    fs::rename(&staging, &final_dir)
        .with_context(|| format!("move staging dir into {}", final_dir.display()))?;

    info!(round, files = files.len(), "final snapshot written");
    Ok(Some(Finalized {
        round: *round,
        dir: final_dir,
        files,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sanitize::{Sanitizer, is_well_formed};
    use crate::core::types::ExtractedFile;

    fn extracted(ordinal: usize, candidate: &str, content: &str) -> ExtractedFile {
        ExtractedFile {
            ordinal,
            candidate_name: candidate.to_string(),
            language: Some("python".to_string()),
            extension: Some("py".to_string()),
            content: content.to_string(),
            span: 0..0,
        }
    }

    fn file(name: &str, content: &str) -> SanitizedFile {
        SanitizedFile {
            name: name.to_string(),
            content: content.to_string(),
        }
    }

    fn dir_listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_every_file_and_reports_in_region_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("round_1");
        let files: Vec<SanitizedFile> = (0..25)
            .map(|i| file(&format!("f{i:02}.txt"), &format!("body {i}")))
            .collect();

        let report = materialize(&dir, 1, &files, 4).expect("materialize");
        let expected: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
        assert_eq!(report.written, expected);
        assert!(report.failures.is_empty());
        assert_eq!(dir_listing(&dir), expected);
        assert_eq!(fs::read_to_string(dir.join("f07.txt")).expect("read"), "body 7");
    }

    #[test]
    fn empty_files_are_written() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("round_1");
        materialize(&dir, 1, &[file("empty.txt", "")], 2).expect("materialize");
        assert_eq!(fs::metadata(dir.join("empty.txt")).expect("meta").len(), 0);
    }

    #[test]
    fn refuses_non_empty_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("round_1");
        fs::create_dir_all(&dir).expect("mkdir");
        fs::write(dir.join("old.txt"), "x").expect("write");
        assert!(materialize(&dir, 1, &[file("a.txt", "a")], 1).is_err());
        assert_eq!(dir_listing(&dir), vec!["old.txt".to_string()]);
    }

    #[test]
    fn one_failure_does_not_stop_siblings() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("round_1");
        let too_long = format!("{}.py", "x".repeat(300));
        let files = vec![file("a.py", "a"), file(&too_long, "b"), file("c.py", "c")];

        let report = materialize(&dir, 1, &files, 2).expect("materialize");
        assert_eq!(report.written, vec!["a.py".to_string(), "c.py".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].name, too_long);
        assert_eq!(dir_listing(&dir), report.written);
    }

    #[test]
    fn temp_names_never_shadow_round_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("round_1");
        let sanitizer = Sanitizer::with_defaults();
        let resolved = sanitizer.resolve_round(&[
            extracted(1, "`.app.py.tmp`", "KEEP_ME = 1\n"),
            extracted(2, "`app.py`", "APP = 2\n"),
        ]);
        let names: Vec<&str> = resolved.files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec![".app.py.tmp", "app.py"]);
        assert!(!is_well_formed(&temp_name("app.py")));

        for workers in [1, 2] {
            let dir = dir.with_file_name(format!("round_{workers}"));
            let report = materialize(&dir, 1, &resolved.files, workers).expect("materialize");
            assert!(report.failures.is_empty());
            let mut written = report.written.clone();
            written.sort();
            assert_eq!(dir_listing(&dir), written);
            assert_eq!(
                fs::read_to_string(dir.join(".app.py.tmp")).expect("sibling kept"),
                "KEEP_ME = 1\n"
            );
            assert_eq!(fs::read_to_string(dir.join("app.py")).expect("read"), "APP = 2\n");
        }
    }

    #[test]
    fn finalize_copies_last_round() {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let mut rounds = Vec::new();
        for round in 1..=3u32 {
            let dir = root.join(format!("round_{round}"));
            materialize(
                &dir,
                round,
                &[file("main.py", &format!("v{round}")), file("util.py", "u")],
                2,
            )
            .expect("materialize");
            rounds.push((round, dir));
        }

        let finalized = finalize(&rounds, root).expect("finalize").expect("snapshot");
        assert_eq!(finalized.round, 3);
        assert_eq!(finalized.files, vec!["main.py".to_string(), "util.py".to_string()]);
        for name in &finalized.files {
            assert_eq!(
                fs::read(root.join("final").join(name)).expect("final"),
                fs::read(root.join("round_3").join(name)).expect("round")
            );
        }
        assert!(!root.join(STAGING_DIR_NAME).exists());
    }

    #[test]
    fn finalize_without_rounds_is_none() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert_eq!(finalize(&[], temp.path()).expect("finalize"), None);
        assert!(!temp.path().join("final").exists());
    }
}
