//! Prompt rendering for the model-backed stages.
//!
//! Templates are split into sections with `<!-- section:KEY required|droppable -->`
//! markers. When a rendered prompt exceeds the byte budget, droppable sections
//! go first and the last section (the page content) is truncated.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use minijinja::{Environment, context};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::core::freshness::Freshness;
use crate::core::trust::SourceProfile;
use crate::core::types::{SearchResult, StageName, ValidationVerdict};

const SEARCH_TEMPLATE: &str = include_str!("prompts/search.md");
const VALIDATION_TEMPLATE: &str = include_str!("prompts/validation.md");
const REFINEMENT_TEMPLATE: &str = include_str!("prompts/refinement.md");
const SYNTHESIS_TEMPLATE: &str = include_str!("prompts/synthesis.md");

/// Sections dropped first when over budget.
const DROP_ORDER: [&str; 2] = ["rejected", "reasoning"];

const TRUNCATED_MARKER: &str = "\n[truncated]";

static SECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!--\s*section:(\w+)\s+(required|droppable)\s*-->")
        .expect("section marker pattern is valid")
});

/// A source rejected earlier in the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedSource {
    pub url: String,
    pub analysis: String,
}

/// Inputs for the Validation stage prompt.
#[derive(Debug, Clone)]
pub struct ValidationInputs<'a> {
    pub query: &'a str,
    pub candidate: &'a SearchResult,
    pub source: &'a SourceProfile,
    pub freshness: Freshness,
    pub threshold: f64,
}

/// Inputs for the Refinement stage prompt.
#[derive(Debug, Clone)]
pub struct RefinementInputs<'a> {
    pub query: &'a str,
    pub verdict: &'a ValidationVerdict,
    pub rejected_url: &'a str,
    pub rejected: &'a [RejectedSource],
}

/// Inputs for the Synthesis stage prompt.
#[derive(Debug, Clone)]
pub struct SynthesisInputs<'a> {
    pub query: &'a str,
    pub source_url: &'a str,
    pub content: &'a str,
    /// Whether the content passed validation or is best effort.
    pub approved: bool,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Result<Self> {
        let mut env = Environment::new();
        for (stage, source) in [
            (StageName::Search, SEARCH_TEMPLATE),
            (StageName::Validation, VALIDATION_TEMPLATE),
            (StageName::Refinement, REFINEMENT_TEMPLATE),
            (StageName::Synthesis, SYNTHESIS_TEMPLATE),
        ] {
            env.add_template(stage.as_str(), source)
                .with_context(|| format!("load {stage} template"))?;
        }
        Ok(Self { env })
    }

    fn render(&self, stage: StageName, ctx: minijinja::Value) -> Result<String> {
        let template = self.env.get_template(stage.as_str())?;
        template
            .render(ctx)
            .with_context(|| format!("render {stage} prompt"))
    }
}

/// A parsed section from rendered template output.
#[derive(Debug, Clone)]
struct ParsedSection {
    key: String,
    required: bool,
    content: String,
}

fn parse_sections(rendered: &str) -> Vec<ParsedSection> {
    let markers: Vec<(usize, usize, String, bool)> = SECTION_RE
        .captures_iter(rendered)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some((
                whole.start(),
                whole.end(),
                caps.get(1)?.as_str().to_string(),
                caps.get(2)?.as_str() == "required",
            ))
        })
        .collect();

    let mut sections = Vec::new();
    for (i, (_, body_start, key, required)) in markers.iter().enumerate() {
        let body_end = markers
            .get(i + 1)
            .map(|next| next.0)
            .unwrap_or(rendered.len());
        let content = rendered[*body_start..body_end].trim().to_string();
        if !content.is_empty() || *required {
            sections.push(ParsedSection {
                key: key.clone(),
                required: *required,
                content,
            });
        }
    }
    sections
}

fn apply_budget_to_sections(sections: &mut Vec<ParsedSection>, budget: usize) {
    let total_len =
        |secs: &[ParsedSection]| -> usize { secs.iter().map(|s| s.content.len()).sum() };

    if total_len(sections) <= budget {
        return;
    }

    for key in DROP_ORDER {
        if total_len(sections) <= budget {
            break;
        }
        if let Some(idx) = sections.iter().position(|s| s.key == key && !s.required) {
            debug!(
                section = key,
                bytes_dropped = sections[idx].content.len(),
                "dropped section for budget"
            );
            sections.remove(idx);
        }
    }

    let other_len: usize = sections
        .iter()
        .rev()
        .skip(1)
        .map(|s| s.content.len())
        .sum();
    if let Some(last) = sections.last_mut() {
        let allowed = budget.saturating_sub(other_len);
        let before_len = last.content.len();
        if before_len > allowed {
            if allowed > TRUNCATED_MARKER.len() {
                truncate_on_char_boundary(&mut last.content, allowed - TRUNCATED_MARKER.len());
                last.content.push_str(TRUNCATED_MARKER);
            } else {
                truncate_on_char_boundary(&mut last.content, allowed);
            }
            debug!(
                section = %last.key,
                before_len,
                after_len = last.content.len(),
                "truncated section for budget"
            );
        }
    }
}

fn truncate_on_char_boundary(text: &mut String, max_len: usize) {
    let mut cut = max_len.min(text.len());
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    text.truncate(cut);
}

fn render_sections(sections: &[ParsedSection]) -> String {
    sections
        .iter()
        .map(|s| s.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds stage prompts within a byte budget.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    budget_bytes: usize,
}

impl PromptBuilder {
    pub fn new(budget_bytes: usize) -> Self {
        Self { budget_bytes }
    }

    pub fn build_search(&self, query: &str) -> Result<String> {
        self.build(StageName::Search, context! { query => query.trim() })
    }

    pub fn build_validation(&self, input: &ValidationInputs<'_>) -> Result<String> {
        self.build(
            StageName::Validation,
            context! {
                query => input.query.trim(),
                candidate => input.candidate,
                tier => input.source.tier.as_str(),
                opinion => input.source.opinion,
                freshness => describe_freshness(input.freshness),
                threshold => input.threshold,
            },
        )
    }

    pub fn build_refinement(&self, input: &RefinementInputs<'_>) -> Result<String> {
        self.build(
            StageName::Refinement,
            context! {
                query => input.query.trim(),
                rejected_url => input.rejected_url,
                confidence => format!("{:.2}", input.verdict.confidence_score),
                analysis => input.verdict.analysis.trim(),
                rejected => input.rejected,
            },
        )
    }

    pub fn build_synthesis(&self, input: &SynthesisInputs<'_>) -> Result<String> {
        self.build(
            StageName::Synthesis,
            context! {
                query => input.query.trim(),
                source_url => input.source_url.trim(),
                content => input.content.trim(),
                approved => input.approved,
            },
        )
    }

    fn build(&self, stage: StageName, ctx: minijinja::Value) -> Result<String> {
        let rendered = PromptEngine::new()?.render(stage, ctx)?;
        let mut sections = parse_sections(&rendered);
        apply_budget_to_sections(&mut sections, self.budget_bytes);
        Ok(render_sections(&sections))
    }
}

fn describe_freshness(freshness: Freshness) -> Option<String> {
    match freshness {
        Freshness::NotApplicable => None,
        Freshness::Undated => Some("no date found; the question asks about the current state".into()),
        Freshness::Fresh { age_days } => Some(format!("published about {age_days} days ago")),
        Freshness::Stale { age_days } => Some(format!(
            "published about {age_days} days ago; likely outdated for a question about the current state"
        )),
    }
}
