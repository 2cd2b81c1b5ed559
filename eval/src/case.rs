//! Case file parsing and validation.
//!
//! Cases are TOML files defining a civic question and answer checks.
//! See `eval/cases/` for examples.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;

/// A parsed case file containing the query, config overrides, and checks.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CaseFile {
    pub case: CaseMeta,
    #[serde(default)]
    pub config: CaseConfig,
    #[serde(default)]
    pub checks: Vec<Check>,
}

/// Case metadata: identifier and the question to ask.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CaseMeta {
    /// Unique identifier (slug format: `[a-z0-9_-]+`).
    pub id: String,
    pub query: String,
    /// User id for the session (default: `eval`).
    #[serde(default = "default_user_id")]
    pub user_id: String,
}

fn default_user_id() -> String {
    "eval".to_string()
}

/// Pipeline configuration overrides for the case.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct CaseConfig {
    pub max_iterations: Option<u32>,
    pub approval_threshold: Option<f64>,
    pub stale_after_days: Option<i64>,
}

/// Check applied to the answer once the run finishes.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Check {
    /// The run produced a synthesized answer.
    Answered,
    /// The answer mentions `text` (case-insensitive).
    AnswerContains { text: String },
    /// The answer has the `## Source URL` and `## Summary` sections.
    HasSections,
    /// The cited source URL contains `text`.
    SourceUrlContains { text: String },
}

impl CaseFile {
    /// Load and validate a case file from the given path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            fs::read_to_string(path).with_context(|| format!("read case {}", path.display()))?;
        let case: CaseFile =
            toml::from_str(&contents).with_context(|| format!("parse case {}", path.display()))?;
        case.validate()
            .with_context(|| format!("validate case {}", path.display()))?;
        Ok(case)
    }

    #[cfg(test)]
    pub fn parse_str(contents: &str) -> Result<Self> {
        let case: CaseFile = toml::from_str(contents).context("parse case")?;
        case.validate()?;
        Ok(case)
    }

    fn validate(&self) -> Result<()> {
        validate_case_id(&self.case.id)?;
        if self.case.query.trim().is_empty() {
            bail!("case.query must be non-empty");
        }
        if self.case.user_id.trim().is_empty() {
            bail!("case.user_id must be non-empty");
        }
        if self.config.max_iterations == Some(0) {
            bail!("config.max_iterations must be > 0");
        }
        if let Some(threshold) = self.config.approval_threshold
            && !(threshold > 0.0 && threshold <= 1.0)
        {
            bail!("config.approval_threshold must be in (0, 1]");
        }
        if let Some(days) = self.config.stale_after_days
            && days <= 0
        {
            bail!("config.stale_after_days must be > 0");
        }
        if self.checks.is_empty() {
            bail!("checks must be a non-empty array");
        }
        for (index, check) in self.checks.iter().enumerate() {
            check
                .validate()
                .with_context(|| format!("checks[{}] invalid", index))?;
        }
        Ok(())
    }
}

impl Check {
    fn validate(&self) -> Result<()> {
        match self {
            Check::AnswerContains { text } => {
                if text.trim().is_empty() {
                    bail!("answer_contains.text must be non-empty");
                }
            }
            Check::SourceUrlContains { text } => {
                if text.trim().is_empty() {
                    bail!("source_url_contains.text must be non-empty");
                }
            }
            Check::Answered | Check::HasSections => {}
        }
        Ok(())
    }
}

/// Discover and load all case files from a directory.
///
/// Returns cases sorted by id. Errors if duplicate ids are found.
pub fn discover_cases(dir: &Path) -> Result<Vec<CaseFile>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut cases = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("read cases dir {}", dir.display()))? {
        let entry = entry.context("read case entry")?;
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("toml") {
            continue;
        }
        cases.push(CaseFile::load(&path)?);
    }
    cases.sort_by(|left, right| left.case.id.cmp(&right.case.id));
    for pair in cases.windows(2) {
        if pair[0].case.id == pair[1].case.id {
            return Err(anyhow!("duplicate case.id {}", pair[0].case.id));
        }
    }
    Ok(cases)
}

fn validate_case_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        bail!("case.id must be non-empty");
    }
    if !id
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-' || ch == '_')
    {
        bail!("case.id must use [a-z0-9_-] only");
    }
    Ok(())
}
