//! Prompt rendering for collaborator calls.

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::io::collaborator::{GenerateRequest, ReviewRequest};

const GENERATE_TEMPLATE: &str = include_str!("prompts/generate.md");
const REFINE_TEMPLATE: &str = include_str!("prompts/refine.md");
const REVIEW_TEMPLATE: &str = include_str!("prompts/review.md");

/// Template engine wrapper around minijinja.
#[derive(Debug)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("generate", GENERATE_TEMPLATE)
            .context("load generate template")?;
        env.add_template("refine", REFINE_TEMPLATE)
            .context("load refine template")?;
        env.add_template("review", REVIEW_TEMPLATE)
            .context("load review template")?;
        Ok(Self { env })
    }

    /// Render the generator prompt. The first round asks for a fresh
    /// implementation; later rounds carry the previous files and review.
    pub fn render_generate(&self, request: &GenerateRequest) -> Result<String> {
        let rendered = match &request.previous {
            None => self.env.get_template("generate")?.render(context! {
                task => request.task.trim(),
            })?,
            Some(previous) => self.env.get_template("refine")?.render(context! {
                round => request.round,
                task => request.task.trim(),
                review_notes => previous.review_notes.trim(),
                files => &previous.files,
            })?,
        };
        Ok(rendered)
    }

    pub fn render_review(&self, request: &ReviewRequest) -> Result<String> {
        let rendered = self.env.get_template("review")?.render(context! {
            round => request.round,
            task => request.task.trim(),
            files => &request.files,
        })?;
        Ok(rendered)
    }
}
