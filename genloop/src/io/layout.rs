//! Project directory layout.
//!
//! ```text
//! <output_dir>/generated_code_<YYYYmmdd_HHMMSS>_<id>/
//!   round_1/ ... round_N/
//!   final/
//!   generation_history.json
//!   detailed_generation_history.json
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use rand::{Rng, distributions::Alphanumeric};
use tracing::debug;

use crate::core::history::FINAL_DIR_NAME;

pub const COMPACT_HISTORY_FILE: &str = "generation_history.json";
pub const DETAILED_HISTORY_FILE: &str = "detailed_generation_history.json";
pub const PROJECT_DIR_PREFIX: &str = "generated_code";

const ROUND_DIR_PREFIX: &str = "round_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub final_dir: PathBuf,
    pub compact_history_path: PathBuf,
    pub detailed_history_path: PathBuf,
    round_dir_width: usize,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>, round_dir_width: usize) -> Self {
        let root = root.into();
        Self {
            final_dir: root.join(FINAL_DIR_NAME),
            compact_history_path: root.join(COMPACT_HISTORY_FILE),
            detailed_history_path: root.join(DETAILED_HISTORY_FILE),
            round_dir_width,
            root,
        }
    }

    pub fn round_dir(&self, round: u32) -> PathBuf {
        self.root.join(round_dir_name(round, self.round_dir_width))
    }

    pub fn round_dir_width(&self) -> usize {
        self.round_dir_width
    }
}

/// `round_<i>`, zero-padded to `width` digits.
pub fn round_dir_name(round: u32, width: usize) -> String {
    format!("{ROUND_DIR_PREFIX}{round:0width$}")
}

/// Inverse of [`round_dir_name`] for any padding.
pub fn parse_round_dir_name(name: &str) -> Option<u32> {
    let digits = name.strip_prefix(ROUND_DIR_PREFIX)?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Round directories directly under `root`, ordered by parsed index.
pub fn list_round_dirs(root: &Path) -> Result<Vec<(u32, PathBuf)>> {
    let mut rounds = Vec::new();
    for entry in fs::read_dir(root).with_context(|| format!("read dir {}", root.display()))? {
        let entry = entry.with_context(|| format!("read entry in {}", root.display()))?;
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        if !file_type.is_dir() {
            continue;
        }
        if let Some(round) = entry.file_name().to_str().and_then(parse_round_dir_name) {
            rounds.push((round, entry.path()));
        }
    }
    rounds.sort_by_key(|(round, _)| *round);
    Ok(rounds)
}

/// Create a fresh project directory under `base_dir`.
pub fn create_project_dir(base_dir: &Path, round_dir_width: usize) -> Result<ProjectPaths> {
    fs::create_dir_all(base_dir)
        .with_context(|| format!("create output dir {}", base_dir.display()))?;
    let name = build_project_name(&generate_timestamp(), &generate_short_id());
    let root = base_dir.join(&name);
    if root.exists() {
        bail!("project directory already exists: {}", root.display());
    }
    fs::create_dir(&root).with_context(|| format!("create project dir {}", root.display()))?;
    debug!(root = %root.display(), "created project directory");
    Ok(ProjectPaths::new(root, round_dir_width))
}

pub fn build_project_name(timestamp: &str, short_id: &str) -> String {
    format!("{PROJECT_DIR_PREFIX}_{timestamp}_{short_id}")
}

fn generate_timestamp() -> String {
    Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

fn generate_short_id() -> String {
    let mut rng = rand::thread_rng();
    std::iter::repeat_with(|| rng.sample(Alphanumeric))
        .map(char::from)
        .take(6)
        .collect::<String>()
        .to_lowercase()
}
