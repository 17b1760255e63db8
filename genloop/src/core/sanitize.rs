//! Filename sanitizer shared by the live pipeline and the repair pass.
//!
//! [`Sanitizer::sanitize`] is pure: the same candidate, existing-name set and
//! extension hint always produce the same name. Every result matches
//! `[A-Za-z0-9_.-]+`, contains no `..`, and is absent from the existing set.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

use crate::core::error::NamingIssue;
use crate::core::language::{has_recognizable_name, recognizable_extension};
use crate::core::types::{ExtractedFile, SanitizedFile};

/// Labels stripped when they prefix a name (`file: x`, `檔案：x`).
pub const DEFAULT_LABELS: &[&str] = &[
    "file", "filename", "file name", "path", "文件", "文件名", "檔案", "档案", "檔名",
];

/// Longest name we will write, in bytes.
pub const MAX_NAME_LEN: usize = 120;

const DECORATION: &[char] = &[
    '`', '"', '\'', '“', '”', '‘', '’', '「', '」', '『', '』', '《', '》', '*', '=', '#', '>',
    '[', ']',
];

static NUMBERING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\d{1,3}[.)]\s+|\d{1,3}\)\s*|[-+]\s+)").unwrap());
static DRIVE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z]:").unwrap());
static BACKTICKED_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`\s]+)`").unwrap());

/// A resolved name plus the recoveries that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    pub name: String,
    pub issues: Vec<NamingIssue>,
}

/// Names and issues for every file of one round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRound {
    pub files: Vec<SanitizedFile>,
    pub issues: Vec<NamingIssue>,
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    label_re: Option<Regex>,
    default_extension: String,
}

impl Sanitizer {
    /// Build a sanitizer from a label list and the extension used when neither
    /// the candidate nor the hint supplies one.
    pub fn new<S: AsRef<str>>(labels: &[S], default_extension: &str) -> Result<Self> {
        let default_extension = normalize_extension(default_extension).ok_or_else(|| {
            anyhow!("default extension must be 1-10 ASCII alphanumerics, got {default_extension:?}")
        })?;
        Ok(Self {
            label_re: compile_labels(labels)?,
            default_extension,
        })
    }

    /// Sanitizer with [`DEFAULT_LABELS`] and a `txt` fallback extension.
    pub fn with_defaults() -> Self {
        Self {
            label_re: compile_labels(DEFAULT_LABELS).ok().flatten(),
            default_extension: "txt".to_string(),
        }
    }

    /// Resolve `candidate` into a safe name that is not in `existing`.
    pub fn sanitize(
        &self,
        candidate: &str,
        existing: &BTreeSet<String>,
        extension_hint: Option<&str>,
    ) -> Sanitized {
        let mut issues = Vec::new();
        let cleaned = self.clean(candidate);

        let name = if is_path_escape(&cleaned) {
            let last = cleaned.replace('\\', "/");
            let last = last.rsplit('/').next().unwrap_or_default().to_string();
            let hint = recognizable_extension(&last).or(extension_hint);
            let resolved = self.synthesize(existing, hint);
            issues.push(NamingIssue::PathEscape {
                candidate: candidate.to_string(),
                resolved: resolved.clone(),
            });
            resolved
        } else {
            let safe = to_safe_chars(&flatten(&cleaned));
            if safe.is_empty() || !has_recognizable_name(&safe) {
                let resolved = self.synthesize(existing, extension_hint);
                issues.push(NamingIssue::ExtractionAmbiguous {
                    candidate: candidate.to_string(),
                    resolved: resolved.clone(),
                });
                resolved
            } else {
                safe
            }
        };

        let unique = dedupe(&name, existing);
        if unique != name {
            issues.push(NamingIssue::NameCollision {
                wanted: name,
                resolved: unique.clone(),
            });
        }
        Sanitized {
            name: unique,
            issues,
        }
    }

    /// Resolve every name of a round before anything is written.
    ///
    /// Names are chosen in region order so the result does not depend on write
    /// scheduling.
    pub fn resolve_round(&self, files: &[ExtractedFile]) -> ResolvedRound {
        let mut existing = BTreeSet::new();
        let mut resolved = Vec::with_capacity(files.len());
        let mut issues = Vec::new();
        for file in files {
            let sanitized =
                self.sanitize(&file.candidate_name, &existing, file.extension.as_deref());
            existing.insert(sanitized.name.clone());
            issues.extend(sanitized.issues);
            resolved.push(SanitizedFile {
                name: sanitized.name,
                content: file.content.clone(),
            });
        }
        ResolvedRound {
            files: resolved,
            issues,
        }
    }

    /// Strip quoting, decoration, numbering and label prefixes from a candidate.
    ///
    /// The result may still contain unsafe characters or separators.
    pub fn clean(&self, candidate: &str) -> String {
        let mut current = candidate.trim().to_string();
        loop {
            let mut next = current
                .trim_matches(|c: char| c.is_whitespace() || DECORATION.contains(&c))
                .to_string();
            next = NUMBERING_RE.replace(&next, "").into_owned();
            if let Some(re) = &self.label_re {
                next = re.replace(&next, "").into_owned();
            }
            next = next
                .trim_end_matches(|c: char| matches!(c, ':' | '：' | ',' | '，'))
                .to_string();
            if next == current {
                break;
            }
            current = next;
        }
        pick_name_token(&current)
    }

    /// True if sanitizing `name` without a hint keeps information from it
    /// rather than falling back to the default extension.
    pub fn has_usable_name(&self, name: &str) -> bool {
        let cleaned = self.clean(name);
        if is_path_escape(&cleaned) {
            let normalized = cleaned.replace('\\', "/");
            return normalized
                .rsplit('/')
                .next()
                .is_some_and(|last| recognizable_extension(last).is_some());
        }
        has_recognizable_name(&to_safe_chars(&flatten(&cleaned)))
    }

    fn synthesize(&self, existing: &BTreeSet<String>, hint: Option<&str>) -> String {
        let ext = hint
            .and_then(normalize_extension)
            .unwrap_or_else(|| self.default_extension.clone());
        format!("file_{}.{}", existing.len() + 1, ext)
    }
}

/// True if `name` is already in the form the sanitizer produces.
pub fn is_well_formed(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        && !name.contains("..")
        && !name.ends_with('.')
}

fn compile_labels<S: AsRef<str>>(labels: &[S]) -> Result<Option<Regex>> {
    let Some(alternation) = label_alternation(labels) else {
        return Ok(None);
    };
    let pattern = format!(r"(?i)^(?:{alternation})\s*[*_]*\s*[:：]\s*");
    let re = Regex::new(&pattern).map_err(|err| anyhow!("invalid label pattern: {err}"))?;
    Ok(Some(re))
}

/// Regex alternation matching any of `labels`, longest first so `文件名` wins
/// over `文件`. Inner whitespace in a label matches any run of whitespace.
pub(crate) fn label_alternation<S: AsRef<str>>(labels: &[S]) -> Option<String> {
    let mut parts: Vec<String> = labels
        .iter()
        .map(|label| label.as_ref().trim())
        .filter(|label| !label.is_empty())
        .map(|label| {
            label
                .split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s*")
        })
        .collect();
    if parts.is_empty() {
        return None;
    }
    parts.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    Some(parts.join("|"))
}

/// Narrow a cleaned candidate that still carries prose down to its name.
fn pick_name_token(text: &str) -> String {
    if !text.chars().any(char::is_whitespace) {
        return text.to_string();
    }
    if let Some(caps) = BACKTICKED_RE.captures(text) {
        let token = &caps[1];
        if has_recognizable_name(token) {
            return token.to_string();
        }
    }
    if let Some(first) = text.split_whitespace().next() {
        let first = first.trim_matches(|c: char| DECORATION.contains(&c) || c == ':');
        if has_recognizable_name(first) {
            return first.to_string();
        }
    }
    text.to_string()
}

fn is_path_escape(cleaned: &str) -> bool {
    let normalized = cleaned.replace('\\', "/");
    normalized.starts_with('/')
        || normalized.starts_with('~')
        || DRIVE_RE.is_match(&normalized)
        || normalized.split('/').any(|segment| segment.trim() == "..")
}

fn flatten(cleaned: &str) -> String {
    cleaned
        .replace('\\', "/")
        .split('/')
        .map(str::trim)
        .filter(|segment| !segment.is_empty() && *segment != ".")
        .collect::<Vec<_>>()
        .join("_")
}

fn to_safe_chars(text: &str) -> String {
    let mut out: String = text
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    while out.contains("..") {
        out = out.replace("..", ".");
    }
    let out = out.trim_end_matches('.');
    truncate_name(out)
}

fn truncate_name(name: &str) -> String {
    if name.len() <= MAX_NAME_LEN {
        return name.to_string();
    }
    match recognizable_extension(name) {
        Some(ext) => {
            let keep = MAX_NAME_LEN - ext.len() - 1;
            format!("{}.{}", name[..keep].trim_end_matches('.'), ext)
        }
        None => name[..MAX_NAME_LEN].trim_end_matches('.').to_string(),
    }
}

fn normalize_extension(ext: &str) -> Option<String> {
    let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
    if ext.is_empty() || ext.len() > 10 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext)
}

fn dedupe(name: &str, existing: &BTreeSet<String>) -> String {
    if !existing.contains(name) {
        return name.to_string();
    }
    let (stem, ext) = match recognizable_extension(name) {
        Some(ext) => (&name[..name.len() - ext.len() - 1], Some(ext)),
        None => (name, None),
    };
    (2..)
        .map(|n| match ext {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        })
        .find(|candidate| !existing.contains(candidate))
        .unwrap_or_else(|| name.to_string())
}
