//! Collaborator abstraction for model invocation.
//!
//! The [`Collaborator`] trait decouples the round loop from the model backend.
//! [`CommandCollaborator`] shells out to a configured command per call; tests
//! use scripted collaborators that return predetermined responses.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::error::CollaboratorError;
use crate::core::types::{AgentRole, ResponseBlob, SanitizedFile};
use crate::io::config::CollaboratorConfig;
use crate::io::process::run_command_with_timeout;
use crate::io::prompt::PromptEngine;

/// Files and critique carried from the previous round into the next.
#[derive(Debug, Clone, Serialize)]
pub struct PreviousRound {
    pub files: Vec<SanitizedFile>,
    pub review_notes: String,
}

/// Ask the generator for round `round`'s file set.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub round: u32,
    pub task: String,
    /// `None` in the first round.
    pub previous: Option<PreviousRound>,
}

/// Ask the reviewer to critique the files resolved in `round`.
#[derive(Debug, Clone)]
pub struct ReviewRequest {
    pub round: u32,
    pub task: String,
    pub files: Vec<SanitizedFile>,
}

/// Model invocation boundary.
///
/// Failures should be [`CollaboratorError`]s wrapped in `anyhow`; the round
/// loop downcasts them to decide whether the run stops.
pub trait Collaborator {
    fn generate(&mut self, request: &GenerateRequest) -> Result<ResponseBlob>;
    fn review(&mut self, request: &ReviewRequest) -> Result<ResponseBlob>;
}

/// Collaborator that runs one child process per call: the rendered prompt goes
/// to stdin and stdout is the response.
#[derive(Debug)]
pub struct CommandCollaborator {
    config: CollaboratorConfig,
    prompts: PromptEngine,
}

impl CommandCollaborator {
    pub fn new(config: CollaboratorConfig) -> Result<Self> {
        Ok(Self {
            config,
            prompts: PromptEngine::new()?,
        })
    }

    fn call(&self, role: AgentRole, round: u32, prompt: &str) -> Result<ResponseBlob> {
        let argv = match role {
            AgentRole::Generator => &self.config.generate_command,
            AgentRole::Reviewer => &self.config.review_command,
        };
        let timeout = Duration::from_secs(self.config.timeout_secs);
        let failure = |reason: String| CollaboratorError::Failure {
            role,
            round,
            reason,
        };

        let Some((program, args)) = argv.split_first() else {
            return Err(failure("empty command".to_string()).into());
        };
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env("GENLOOP_ROLE", role.as_str())
            .env("GENLOOP_ROUND", round.to_string());

        info!(%role, round, program = %program, "invoking collaborator");
        let output = run_command_with_timeout(
            cmd,
            Some(prompt.as_bytes()),
            timeout,
            self.config.output_limit_bytes,
        )
        .map_err(|err| failure(format!("{err:#}")))?;

        if output.timed_out {
            warn!(%role, round, timeout_secs = timeout.as_secs(), "collaborator timed out");
            return Err(CollaboratorError::Timeout {
                role,
                round,
                timeout,
            }
            .into());
        }
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(%role, round, exit_code = ?output.status.code(), "collaborator failed");
            return Err(failure(format!(
                "exit status {:?}: {}{}",
                output.status.code(),
                stderr.trim(),
                output.stderr_truncated_notice(role.as_str())
            ))
            .into());
        }
        if output.stdout_truncated > 0 {
            warn!(%role, round, truncated = output.stdout_truncated, "response truncated");
        }

        let text = String::from_utf8(output.stdout)
            .map_err(|err| failure(format!("response is not UTF-8: {err}")))?;
        debug!(%role, round, bytes = text.len(), "collaborator responded");
        Ok(ResponseBlob::new(round, role, text))
    }
}

impl Collaborator for CommandCollaborator {
    #[instrument(skip_all, fields(round = request.round))]
    fn generate(&mut self, request: &GenerateRequest) -> Result<ResponseBlob> {
        let prompt = self
            .prompts
            .render_generate(request)
            .context("render generate prompt")?;
        self.call(AgentRole::Generator, request.round, &prompt)
    }

    #[instrument(skip_all, fields(round = request.round, files = request.files.len()))]
    fn review(&mut self, request: &ReviewRequest) -> Result<ResponseBlob> {
        let prompt = self
            .prompts
            .render_review(request)
            .context("render review prompt")?;
        self.call(AgentRole::Reviewer, request.round, &prompt)
    }
}
