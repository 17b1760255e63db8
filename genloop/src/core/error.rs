//! Typed conditions raised by the pipeline.
//!
//! Recoverable naming issues are returned next to the value they affected so the
//! caller can log them. The remaining kinds travel through `anyhow` and are
//! downcast where behavior depends on them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::AgentRole;

/// A naming defect that the sanitizer resolved deterministically.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingIssue {
    #[error("no usable name in {candidate:?}; synthesized {resolved}")]
    ExtractionAmbiguous { candidate: String, resolved: String },
    #[error("{wanted} already taken; renamed to {resolved}")]
    NameCollision { wanted: String, resolved: String },
    #[error("{candidate:?} escapes the round directory; synthesized {resolved}")]
    PathEscape { candidate: String, resolved: String },
}

/// `ProjectHistory::append` received a round out of sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("round order violation: expected round {expected}, got {got}")]
pub struct RoundOrderViolation {
    pub expected: u32,
    pub got: u32,
}

/// One file of a round could not be written.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("write {name} failed: {reason}")]
pub struct WriteFailure {
    pub name: String,
    pub reason: String,
}

/// The collaborator boundary failed; the current round is aborted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("{role} timed out after {timeout:?} in round {round}")]
    Timeout {
        role: AgentRole,
        round: u32,
        timeout: Duration,
    },
    #[error("{role} failed in round {round}: {reason}")]
    Failure {
        role: AgentRole,
        round: u32,
        reason: String,
    },
}

impl CollaboratorError {
    pub fn round(&self) -> u32 {
        match self {
            CollaboratorError::Timeout { round, .. } | CollaboratorError::Failure { round, .. } => {
                *round
            }
        }
    }
}
