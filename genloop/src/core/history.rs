//! Lineage record of a generation run.
//!
//! [`ProjectHistory`] is append-only: rounds arrive strictly in order and are
//! never rewritten. [`ProjectHistory::serialize`] derives the two persisted
//! documents from the same record so their round keys always agree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::error::{RoundOrderViolation, WriteFailure};
use crate::core::types::ResponseBlob;

/// Default number of task characters kept in the compact document.
pub const DEFAULT_TASK_SUMMARY_CHARS: usize = 200;

/// Directory name of the consolidated snapshot.
pub const FINAL_DIR_NAME: &str = "final";

/// Why the run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopReason {
    Completed,
    Aborted,
}

impl StopReason {
    pub fn as_str(self) -> &'static str {
        match self {
            StopReason::Completed => "completed",
            StopReason::Aborted => "aborted",
        }
    }
}

/// What one round left on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundManifest {
    pub round: u32,
    /// File names in the round directory, in region order.
    pub files: Vec<String>,
    pub review_notes: String,
    #[serde(default)]
    pub write_failures: Vec<WriteFailure>,
}

/// Raw collaborator responses of one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    pub generator: ResponseBlob,
    pub reviewer: ResponseBlob,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundRecord {
    pub manifest: RoundManifest,
    pub transcript: Transcript,
}

/// Pointer to the consolidated file set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSnapshot {
    /// Round the snapshot was copied from.
    pub round: u32,
    pub directory: String,
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectHistory {
    task: String,
    total_rounds: u32,
    output_directory: String,
    started_at: String,
    finished_at: Option<String>,
    stop_reason: Option<StopReason>,
    rounds: Vec<RoundRecord>,
    final_snapshot: Option<FinalSnapshot>,
}

impl ProjectHistory {
    pub fn new(
        task: impl Into<String>,
        total_rounds: u32,
        output_directory: impl Into<String>,
        started_at: impl Into<String>,
    ) -> Self {
        Self {
            task: task.into(),
            total_rounds,
            output_directory: output_directory.into(),
            started_at: started_at.into(),
            finished_at: None,
            stop_reason: None,
            rounds: Vec::new(),
            final_snapshot: None,
        }
    }

    /// Append one round. The round index must be exactly one past the last
    /// appended round (the first round is 1).
    pub fn append(
        &mut self,
        manifest: RoundManifest,
        transcript: Transcript,
    ) -> Result<&RoundRecord, RoundOrderViolation> {
        let expected = self.last_round() + 1;
        if manifest.round != expected {
            return Err(RoundOrderViolation {
                expected,
                got: manifest.round,
            });
        }
        self.rounds.push(RoundRecord {
            manifest,
            transcript,
        });
        Ok(&self.rounds[self.rounds.len() - 1])
    }

    /// Record how the run ended and which file set became `final/`.
    pub fn finish(
        &mut self,
        stop_reason: StopReason,
        finished_at: impl Into<String>,
        final_snapshot: Option<FinalSnapshot>,
    ) {
        self.stop_reason = Some(stop_reason);
        self.finished_at = Some(finished_at.into());
        self.final_snapshot = final_snapshot;
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    pub fn total_rounds(&self) -> u32 {
        self.total_rounds
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    /// Index of the last appended round, 0 when none.
    pub fn last_round(&self) -> u32 {
        self.rounds.last().map_or(0, |record| record.manifest.round)
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop_reason
    }

    pub fn final_snapshot(&self) -> Option<&FinalSnapshot> {
        self.final_snapshot.as_ref()
    }

    pub fn serialize(&self, task_summary_chars: usize) -> HistoryDocuments {
        let compact = CompactHistory {
            task: summarize_task(&self.task, task_summary_chars),
            total_rounds: self.total_rounds,
            completed_rounds: self.last_round(),
            output_directory: self.output_directory.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            stop_reason: self.stop_reason,
            rounds: self
                .rounds
                .iter()
                .map(|record| {
                    (
                        record.manifest.round,
                        CompactRound {
                            files: record.manifest.files.clone(),
                        },
                    )
                })
                .collect(),
            final_snapshot: self.final_snapshot.clone(),
        };
        let detailed = DetailedHistory {
            task: self.task.clone(),
            total_rounds: self.total_rounds,
            completed_rounds: self.last_round(),
            output_directory: self.output_directory.clone(),
            started_at: self.started_at.clone(),
            finished_at: self.finished_at.clone(),
            stop_reason: self.stop_reason,
            rounds: self
                .rounds
                .iter()
                .map(|record| {
                    (
                        record.manifest.round,
                        DetailedRound {
                            files: record.manifest.files.clone(),
                            review_notes: record.manifest.review_notes.clone(),
                            write_failures: record.manifest.write_failures.clone(),
                            transcript: record.transcript.clone(),
                        },
                    )
                })
                .collect(),
            final_snapshot: self.final_snapshot.clone(),
        };
        HistoryDocuments { compact, detailed }
    }
}

/// The two persisted views of one history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryDocuments {
    pub compact: CompactHistory,
    pub detailed: DetailedHistory,
}

/// `generation_history.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactHistory {
    pub task: String,
    pub total_rounds: u32,
    pub completed_rounds: u32,
    pub output_directory: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stop_reason: Option<StopReason>,
    pub rounds: BTreeMap<u32, CompactRound>,
    #[serde(rename = "final")]
    pub final_snapshot: Option<FinalSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactRound {
    pub files: Vec<String>,
}

/// `detailed_generation_history.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedHistory {
    pub task: String,
    pub total_rounds: u32,
    pub completed_rounds: u32,
    pub output_directory: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub stop_reason: Option<StopReason>,
    pub rounds: BTreeMap<u32, DetailedRound>,
    #[serde(rename = "final")]
    pub final_snapshot: Option<FinalSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedRound {
    pub files: Vec<String>,
    pub review_notes: String,
    pub write_failures: Vec<WriteFailure>,
    pub transcript: Transcript,
}

/// Keep the first `max_chars` characters, marking the cut with `...`.
pub fn summarize_task(task: &str, max_chars: usize) -> String {
    match task.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &task[..cut]),
        None => task.to_string(),
    }
}
