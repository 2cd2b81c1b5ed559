//! Typed stage outputs and pipeline events shared across the civiclink core.
//!
//! These types define the contracts between stages. They carry no behavior that
//! touches the outside world and must stay deterministic across runs.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of a pipeline stage, used to tag events and requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Search,
    Validation,
    Refinement,
    ExitCheck,
    Synthesis,
}

impl StageName {
    pub fn as_str(self) -> &'static str {
        match self {
            StageName::Search => "search",
            StageName::Validation => "validation",
            StageName::Refinement => "refinement",
            StageName::ExitCheck => "exit_check",
            StageName::Synthesis => "synthesis",
        }
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Candidate source produced by the Search and Refinement stages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Candidate URLs, most relevant first.
    pub search_results: Vec<String>,
    /// The URL the stage chose to fetch.
    pub url: String,
    /// Page text fetched from `url`.
    pub raw_content: String,
    /// Query the search was run for.
    pub query: String,
    /// Publication or last-updated date as found on the page.
    pub timestamp: String,
    pub reasoning: String,
}

impl SearchResult {
    pub fn has_content(&self) -> bool {
        !self.raw_content.trim().is_empty()
    }
}

/// Verdict produced by the Validation stage.
///
/// `raw_content` is non-empty exactly when `approved` is true.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    /// One-sentence explanation of the verdict.
    pub analysis: String,
    /// Confidence in the source's credibility, in `[0, 1]`.
    pub confidence_score: f64,
    pub approved: bool,
    pub raw_content: String,
}

impl ValidationVerdict {
    /// A rejection carrying the given analysis and no content.
    pub fn rejected(analysis: impl Into<String>, confidence_score: f64) -> Self {
        Self {
            analysis: analysis.into(),
            confidence_score,
            approved: false,
            raw_content: String::new(),
        }
    }

    pub fn carries_content(&self) -> bool {
        !self.raw_content.is_empty()
    }

    /// Returns true when `approved` agrees with the presence of content.
    pub fn is_consistent(&self) -> bool {
        self.approved == self.carries_content()
    }
}

/// Markdown summary produced by the Synthesis stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisResult {
    pub source_url: String,
    /// Markdown body of the summary section.
    pub summary: String,
}

impl SynthesisResult {
    /// Render as markdown with `Source URL` and `Summary` level-2 headers.
    pub fn to_markdown(&self) -> String {
        format!(
            "## Source URL\n{}\n\n## Summary\n{}",
            self.source_url.trim(),
            self.summary.trim()
        )
    }
}

/// Output of the Refinement stage.
#[derive(Debug, Clone, PartialEq)]
pub enum RefinementOutput {
    /// The latest verdict was approved and is carried forward untouched.
    PassThrough(ValidationVerdict),
    /// A fresh candidate to validate on the next pass.
    Refined(SearchResult),
}

/// Decision returned by the Exit-Check stage to the loop controller.
#[derive(Debug, Clone, PartialEq)]
pub enum ExitDecision {
    Continue,
    Terminate(ValidationVerdict),
}

/// Immutable record emitted while the pipeline runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineEvent {
    pub stage: StageName,
    /// Names of tools invoked while producing this event.
    pub tool_calls: Vec<String>,
    /// Text payload, present on a stage's output event.
    pub text: Option<String>,
    /// Marks the event carrying the stage's final output.
    pub is_final: bool,
}

impl PipelineEvent {
    pub fn started(stage: StageName) -> Self {
        Self {
            stage,
            tool_calls: Vec::new(),
            text: None,
            is_final: false,
        }
    }

    pub fn tool_call(stage: StageName, name: impl Into<String>) -> Self {
        Self {
            stage,
            tool_calls: vec![name.into()],
            text: None,
            is_final: false,
        }
    }

    pub fn output(stage: StageName, text: impl Into<String>) -> Self {
        Self {
            stage,
            tool_calls: Vec::new(),
            text: Some(text.into()),
            is_final: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesis_markdown_has_both_headers_on_their_own_lines() {
        let result = SynthesisResult {
            source_url: " https://countyx.gov/trees ".to_string(),
            summary: "- Permits are not required.\n".to_string(),
        };
        assert_eq!(
            result.to_markdown(),
            "## Source URL\nhttps://countyx.gov/trees\n\n## Summary\n- Permits are not required."
        );
    }

    #[test]
    fn rejected_verdict_is_consistent() {
        let verdict = ValidationVerdict::rejected("blog post", 0.4);
        assert!(!verdict.approved);
        assert!(verdict.is_consistent());
    }

    #[test]
    fn approved_verdict_without_content_is_inconsistent() {
        let verdict = ValidationVerdict {
            approved: true,
            ..ValidationVerdict::rejected("ok", 0.99)
        };
        assert!(!verdict.is_consistent());
    }
}
