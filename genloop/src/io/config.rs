//! Pipeline configuration stored in `genloop.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::history::DEFAULT_TASK_SUMMARY_CHARS;
use crate::core::sanitize::{DEFAULT_LABELS, Sanitizer};

/// Default config file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "genloop.toml";

/// Pipeline configuration (TOML).
///
/// Edited by humans; missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Number of generate/review rounds.
    pub rounds: u32,

    /// Parent directory for new project directories.
    pub output_dir: PathBuf,

    /// Upper bound on concurrent file writes within a round.
    pub write_workers: usize,

    /// Treat a response without fenced regions as a single unnamed file.
    pub fallback_whole_response: bool,

    pub naming: NamingConfig,
    pub history: HistoryConfig,
    pub collaborator: CollaboratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct NamingConfig {
    /// Extension used when neither the name nor the language tag gives one.
    pub default_extension: String,
    /// Non-blank lines searched above a fence for a file name.
    pub hint_window_lines: usize,
    /// Minimum digit count of the round index in `round_<i>`.
    pub round_dir_width: usize,
    /// Label words stripped before a name (`file: x`, `檔案：x`).
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Task characters kept in `generation_history.json`.
    pub task_summary_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// Command run for generator calls; the prompt arrives on stdin.
    pub generate_command: Vec<String>,
    /// Command run for reviewer calls.
    pub review_command: Vec<String>,
    /// Wall-clock limit per call.
    pub timeout_secs: u64,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            rounds: 2,
            output_dir: PathBuf::from("generated_code"),
            write_workers: 4,
            fallback_whole_response: true,
            naming: NamingConfig::default(),
            history: HistoryConfig::default(),
            collaborator: CollaboratorConfig::default(),
        }
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            default_extension: "txt".to_string(),
            hint_window_lines: 3,
            round_dir_width: 1,
            labels: DEFAULT_LABELS.iter().map(|label| label.to_string()).collect(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            task_summary_chars: DEFAULT_TASK_SUMMARY_CHARS,
        }
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            generate_command: vec!["llm".to_string(), "generate".to_string()],
            review_command: vec!["llm".to_string(), "review".to_string()],
            timeout_secs: 600,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.rounds == 0 {
            return Err(anyhow!("rounds must be > 0"));
        }
        if self.write_workers == 0 {
            return Err(anyhow!("write_workers must be > 0"));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(anyhow!("output_dir must not be empty"));
        }
        if self.naming.round_dir_width == 0 || self.naming.round_dir_width > 9 {
            return Err(anyhow!("naming.round_dir_width must be between 1 and 9"));
        }
        Sanitizer::new(&self.naming.labels, &self.naming.default_extension)
            .context("invalid naming config")?;
        if self.collaborator.timeout_secs == 0 {
            return Err(anyhow!("collaborator.timeout_secs must be > 0"));
        }
        if self.collaborator.output_limit_bytes == 0 {
            return Err(anyhow!("collaborator.output_limit_bytes must be > 0"));
        }
        for (key, command) in [
            ("generate_command", &self.collaborator.generate_command),
            ("review_command", &self.collaborator.review_command),
        ] {
            if command.is_empty() || command[0].trim().is_empty() {
                return Err(anyhow!("collaborator.{key} must be a non-empty array"));
            }
        }
        Ok(())
    }

    /// Sanitizer built from the naming section.
    pub fn sanitizer(&self) -> Result<Sanitizer> {
        Sanitizer::new(&self.naming.labels, &self.naming.default_extension)
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validate {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
