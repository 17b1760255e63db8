//! Test-only helpers: a scripted collaborator and throwaway project fixtures.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tempfile::TempDir;

use crate::core::error::CollaboratorError;
use crate::core::types::{AgentRole, ResponseBlob};
use crate::io::collaborator::{Collaborator, GenerateRequest, ReviewRequest};
use crate::io::config::PipelineConfig;
use crate::io::layout::ProjectPaths;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Scripted {
    Respond(String),
    Fail(String),
    Timeout,
}

impl Scripted {
    pub fn respond(text: impl Into<String>) -> Self {
        Scripted::Respond(text.into())
    }
}

/// Collaborator that replays queued replies and records every request.
///
/// An exhausted queue behaves like a failing backend.
#[derive(Debug, Default)]
pub struct ScriptedCollaborator {
    generator: VecDeque<Scripted>,
    reviewer: VecDeque<Scripted>,
    pub generate_calls: Vec<GenerateRequest>,
    pub review_calls: Vec<ReviewRequest>,
}

impl ScriptedCollaborator {
    pub fn new(generator: Vec<Scripted>, reviewer: Vec<Scripted>) -> Self {
        Self {
            generator: generator.into(),
            reviewer: reviewer.into(),
            generate_calls: Vec::new(),
            review_calls: Vec::new(),
        }
    }

    fn reply(queue: &mut VecDeque<Scripted>, role: AgentRole, round: u32) -> Result<ResponseBlob> {
        match queue.pop_front() {
            Some(Scripted::Respond(text)) => Ok(ResponseBlob::new(round, role, text)),
            Some(Scripted::Fail(reason)) => Err(CollaboratorError::Failure {
                role,
                round,
                reason,
            }
            .into()),
            Some(Scripted::Timeout) => Err(CollaboratorError::Timeout {
                role,
                round,
                timeout: Duration::from_secs(1),
            }
            .into()),
            None => Err(CollaboratorError::Failure {
                role,
                round,
                reason: "script exhausted".to_string(),
            }
            .into()),
        }
    }
}

impl Collaborator for ScriptedCollaborator {
    fn generate(&mut self, request: &GenerateRequest) -> Result<ResponseBlob> {
        self.generate_calls.push(request.clone());
        Self::reply(&mut self.generator, AgentRole::Generator, request.round)
    }

    fn review(&mut self, request: &ReviewRequest) -> Result<ResponseBlob> {
        self.review_calls.push(request.clone());
        Self::reply(&mut self.reviewer, AgentRole::Reviewer, request.round)
    }
}

/// A temporary project directory removed on drop.
pub struct TestProject {
    temp: TempDir,
}

impl TestProject {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp: tempfile::tempdir()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Project paths rooted at `<temp>/project`.
    pub fn paths(&self) -> ProjectPaths {
        ProjectPaths::new(self.project_dir(), 1)
    }

    pub fn project_dir(&self) -> PathBuf {
        self.temp.path().join("project")
    }

    /// Default config with `rounds` rounds and output under the temp dir.
    pub fn config(&self, rounds: u32) -> PipelineConfig {
        PipelineConfig {
            rounds,
            output_dir: self.temp.path().join("out"),
            ..PipelineConfig::default()
        }
    }
}

/// A generator reply holding one fenced region per `(name, language, body)`.
pub fn fenced_response(files: &[(&str, &str, &str)]) -> String {
    let mut text = String::from("Here is the implementation.\n\n");
    for (name, language, body) in files {
        text.push_str(&format!("=== file: {name} ===\n```{language}\n{body}\n```\n\n"));
    }
    text
}
