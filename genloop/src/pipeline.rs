//! Round loop for `genloop run`.
//!
//! Each round runs generate → extract → resolve names → review → materialize →
//! record, strictly in sequence. All run state lives in a [`RunContext`] owned
//! by [`run_pipeline`]; nothing is global.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{info, instrument, warn};

use crate::core::error::{CollaboratorError, NamingIssue, WriteFailure};
use crate::core::extract::Extractor;
use crate::core::history::{
    FINAL_DIR_NAME, FinalSnapshot, ProjectHistory, RoundManifest, StopReason, Transcript,
};
use crate::core::language::infer_extension_from_content;
use crate::core::sanitize::Sanitizer;
use crate::core::types::{ExtractedFile, ResponseBlob};
use crate::io::collaborator::{Collaborator, GenerateRequest, PreviousRound, ReviewRequest};
use crate::io::config::PipelineConfig;
use crate::io::history_store::write_history;
use crate::io::layout::ProjectPaths;
use crate::io::materialize::{finalize, materialize};

/// Single-owner state threaded through every round of one run.
#[derive(Debug)]
pub struct RunContext {
    config: PipelineConfig,
    paths: ProjectPaths,
    sanitizer: Sanitizer,
    extractor: Extractor,
    history: ProjectHistory,
    completed: Vec<(u32, PathBuf)>,
    previous: Option<PreviousRound>,
}

impl RunContext {
    pub fn new(task: impl Into<String>, config: PipelineConfig, paths: ProjectPaths) -> Result<Self> {
        config.validate()?;
        let sanitizer = config.sanitizer()?;
        let extractor = Extractor::new(
            &config.naming.labels,
            config.naming.hint_window_lines,
            &config.naming.default_extension,
        )?;
        let history = ProjectHistory::new(
            task,
            config.rounds,
            paths.root.display().to_string(),
            Utc::now().to_rfc3339(),
        );
        Ok(Self {
            config,
            paths,
            sanitizer,
            extractor,
            history,
            completed: Vec::new(),
            previous: None,
        })
    }
}

/// Why [`run_pipeline`] stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineStop {
    /// Every planned round completed.
    Completed,
    /// A collaborator call failed; `round` was not written.
    Aborted { round: u32, reason: String },
}

/// Summary of one completed round, passed to the `on_round` callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundOutcome {
    pub round: u32,
    pub dir: PathBuf,
    pub files: Vec<String>,
    pub issues: Vec<NamingIssue>,
    pub write_failures: Vec<WriteFailure>,
    /// The response had no fenced region and was kept whole.
    pub whole_response: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOutcome {
    pub project_dir: PathBuf,
    pub rounds_completed: u32,
    pub stop: PipelineStop,
    pub final_snapshot: Option<FinalSnapshot>,
}

/// Run every round, then write `final/` from the last completed round.
///
/// A collaborator failure stops the loop before anything of that round is
/// written; earlier rounds stay in place and are finalized. Any other error
/// (filesystem, history order) is returned as is.
#[instrument(skip_all, fields(root = %ctx.paths.root.display(), rounds = ctx.config.rounds))]
pub fn run_pipeline<C: Collaborator, F: FnMut(&RoundOutcome)>(
    mut ctx: RunContext,
    collaborator: &mut C,
    mut on_round: F,
) -> Result<PipelineOutcome> {
    let mut stop = PipelineStop::Completed;
    for round in 1..=ctx.config.rounds {
        match run_round(&mut ctx, collaborator, round) {
            Ok(outcome) => on_round(&outcome),
            Err(err) => {
                if let Some(failure) = err.downcast_ref::<CollaboratorError>() {
                    warn!(round = failure.round(), err = %failure, "round aborted");
                    stop = PipelineStop::Aborted {
                        round,
                        reason: failure.to_string(),
                    };
                    break;
                }
                return Err(err);
            }
        }
    }

    let finalized = finalize(&ctx.completed, &ctx.paths.root).context("finalize project")?;
    let final_snapshot = finalized.map(|finalized| FinalSnapshot {
        round: finalized.round,
        directory: FINAL_DIR_NAME.to_string(),
        files: finalized.files,
    });
    let stop_reason = match stop {
        PipelineStop::Completed => StopReason::Completed,
        PipelineStop::Aborted { .. } => StopReason::Aborted,
    };
    ctx.history
        .finish(stop_reason, Utc::now().to_rfc3339(), final_snapshot.clone());
    persist(&ctx)?;

    info!(
        rounds_completed = ctx.history.last_round(),
        stop = stop_reason.as_str(),
        "run finished"
    );
    Ok(PipelineOutcome {
        project_dir: ctx.paths.root.clone(),
        rounds_completed: ctx.history.last_round(),
        stop,
        final_snapshot,
    })
}

#[instrument(skip_all, fields(round = round))]
fn run_round<C: Collaborator>(
    ctx: &mut RunContext,
    collaborator: &mut C,
    round: u32,
) -> Result<RoundOutcome> {
    let task = ctx.history.task().to_string();
    let generated = collaborator.generate(&GenerateRequest {
        round,
        task: task.clone(),
        previous: ctx.previous.clone(),
    })?;

    let mut extracted: Vec<ExtractedFile> = ctx.extractor.extract(&generated).collect();
    let whole_response = extracted.is_empty() && ctx.config.fallback_whole_response;
    if whole_response {
        warn!(round, "no fenced region found; keeping whole response");
        extracted.push(whole_response_file(&generated));
    }

    let resolved = ctx.sanitizer.resolve_round(&extracted);
    for issue in &resolved.issues {
        match issue {
            NamingIssue::NameCollision { .. } => info!(round, %issue, "name adjusted"),
            _ => warn!(round, %issue, "name recovered"),
        }
    }

    let reviewed = collaborator.review(&ReviewRequest {
        round,
        task,
        files: resolved.files.clone(),
    })?;

    let round_dir = ctx.paths.round_dir(round);
    let report = materialize(&round_dir, round, &resolved.files, ctx.config.write_workers)?;

    let manifest = RoundManifest {
        round,
        files: report.written.clone(),
        review_notes: reviewed.text.clone(),
        write_failures: report.failures.clone(),
    };
    ctx.history.append(
        manifest,
        Transcript {
            generator: generated,
            reviewer: reviewed.clone(),
        },
    )?;
    persist(ctx)?;

    ctx.completed.push((round, round_dir.clone()));
    ctx.previous = Some(PreviousRound {
        files: resolved.files,
        review_notes: reviewed.text,
    });

    Ok(RoundOutcome {
        round,
        dir: round_dir,
        files: report.written,
        issues: resolved.issues,
        write_failures: report.failures,
        whole_response,
    })
}

fn whole_response_file(blob: &ResponseBlob) -> ExtractedFile {
    ExtractedFile {
        ordinal: 1,
        candidate_name: String::new(),
        language: None,
        extension: infer_extension_from_content(&blob.text).map(str::to_string),
        content: blob.text.clone(),
        span: 0..blob.text.len(),
    }
}

fn persist(ctx: &RunContext) -> Result<()> {
    let docs = ctx.history.serialize(ctx.config.history.task_summary_chars);
    write_history(&ctx.paths, &docs).context("write history")
}
