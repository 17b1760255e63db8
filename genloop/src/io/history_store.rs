//! Persistence for the lineage record.
//!
//! Both documents are rewritten after every round, so a run that stops early
//! still leaves a consistent history for the rounds it completed.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use jsonschema::validator_for;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::core::history::{CompactHistory, HistoryDocuments};
use crate::io::layout::ProjectPaths;

/// JSON Schema for `generation_history.json`.
pub const COMPACT_HISTORY_SCHEMA: &str =
    include_str!("../../schemas/generation_history.schema.json");

/// Atomically write both history documents into the project directory.
pub fn write_history(paths: &ProjectPaths, docs: &HistoryDocuments) -> Result<()> {
    debug!(
        root = %paths.root.display(),
        rounds = docs.compact.rounds.len(),
        "writing history"
    );
    write_json_atomic(&paths.compact_history_path, &docs.compact)?;
    write_json_atomic(&paths.detailed_history_path, &docs.detailed)?;
    Ok(())
}

/// Read `generation_history.json` and validate it against the bundled schema.
pub fn load_compact_history(path: &Path) -> Result<CompactHistory> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read history {}", path.display()))?;
    let value: Value =
        serde_json::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    validate_compact_history(&value).with_context(|| format!("validate {}", path.display()))?;
    let history: CompactHistory =
        serde_json::from_value(value).with_context(|| format!("decode {}", path.display()))?;
    Ok(history)
}

pub fn validate_compact_history(value: &Value) -> Result<()> {
    let schema: Value =
        serde_json::from_str(COMPACT_HISTORY_SCHEMA).context("parse bundled history schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(value) {
        let messages = compiled
            .iter_errors(value)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "history schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Serialize `value` to pretty-printed JSON with trailing newline, then
/// replace `path` through a temp file.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut buf = serde_json::to_string_pretty(value).context("serialize json")?;
    buf.push('\n');
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, buf).with_context(|| format!("write temp {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace {}", path.display()))?;
    Ok(())
}
