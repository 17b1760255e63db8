//! Shared deterministic types for the generation pipeline.
//!
//! These types define stable contracts between core components. They should not
//! depend on external state or I/O and must remain deterministic across runs.

use std::fmt;
use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Which side of the generator/reviewer pair produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Generator,
    Reviewer,
}

impl AgentRole {
    pub fn as_str(self) -> &'static str {
        match self {
            AgentRole::Generator => "generator",
            AgentRole::Reviewer => "reviewer",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw text returned by a collaborator for one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseBlob {
    pub round: u32,
    pub role: AgentRole,
    pub text: String,
}

impl ResponseBlob {
    pub fn new(round: u32, role: AgentRole, text: impl Into<String>) -> Self {
        Self {
            round,
            role,
            text: text.into(),
        }
    }
}

/// One fenced region pulled out of a response blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedFile {
    /// 1-based position of the region within its blob.
    pub ordinal: usize,
    /// Name hint found near the region. Empty when none was found.
    pub candidate_name: String,
    /// Language tag as written on the opening fence, lowercased.
    pub language: Option<String>,
    /// Extension (without dot) inferred from the language tag or the content.
    pub extension: Option<String>,
    pub content: String,
    /// Byte range of the whole region (fences included) in the source blob.
    pub span: Range<usize>,
}

/// A file whose name has been resolved and is safe to write.
///
/// Invariant: `name` matches `[A-Za-z0-9_.-]+`, is not `.` or `..`, and is unique
/// among the files of its round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SanitizedFile {
    pub name: String,
    pub content: String,
}
