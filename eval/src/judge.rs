//! Check execution.
//!
//! Applies a case's checks to the finished run and records each outcome.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use civiclink::driver::DriverOutcome;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::case::Check;

const SOURCE_HEADING: &str = "## Source URL";
const SUMMARY_HEADING: &str = "## Summary";

/// Collected check outcomes for a run.
#[derive(Debug, Serialize, Deserialize)]
pub struct Judgment {
    pub checks: Vec<CheckOutcome>,
}

impl Judgment {
    pub fn all_passed(&self) -> bool {
        self.checks.iter().all(CheckOutcome::passed)
    }
}

/// Result of running a single check.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CheckOutcome {
    Answered {
        passed: bool,
    },
    AnswerContains {
        text: String,
        passed: bool,
    },
    HasSections {
        passed: bool,
        missing: Vec<String>,
    },
    SourceUrlContains {
        text: String,
        passed: bool,
        source_url: Option<String>,
    },
}

impl CheckOutcome {
    pub fn passed(&self) -> bool {
        match self {
            CheckOutcome::Answered { passed }
            | CheckOutcome::AnswerContains { passed, .. }
            | CheckOutcome::HasSections { passed, .. }
            | CheckOutcome::SourceUrlContains { passed, .. } => *passed,
        }
    }

    /// Stable label used when aggregating pass rates.
    pub fn label(&self) -> String {
        match self {
            CheckOutcome::Answered { .. } => "answered".to_string(),
            CheckOutcome::AnswerContains { text, .. } => format!("answer_contains({text})"),
            CheckOutcome::HasSections { .. } => "has_sections".to_string(),
            CheckOutcome::SourceUrlContains { text, .. } => {
                format!("source_url_contains({text})")
            }
        }
    }
}

/// Run all checks against the driver outcome.
///
/// Only a synthesized answer can pass; the fallback and error texts never do.
#[instrument(skip_all, fields(check_count = checks.len()))]
pub fn run_checks(checks: &[Check], outcome: &DriverOutcome) -> Judgment {
    let answer = match outcome {
        DriverOutcome::Answered {
            markdown,
            source_url,
        } => Some((markdown.as_str(), source_url.as_str())),
        DriverOutcome::NoAnswer | DriverOutcome::Failed { .. } => None,
    };

    let outcomes = checks
        .iter()
        .map(|check| {
            let result = judge(check, answer);
            debug!(check = %result.label(), passed = result.passed(), "check result");
            result
        })
        .collect();
    Judgment { checks: outcomes }
}

fn judge(check: &Check, answer: Option<(&str, &str)>) -> CheckOutcome {
    match check {
        Check::Answered => CheckOutcome::Answered {
            passed: answer.is_some(),
        },
        Check::AnswerContains { text } => CheckOutcome::AnswerContains {
            text: text.clone(),
            passed: answer.is_some_and(|(markdown, _)| {
                markdown.to_lowercase().contains(&text.to_lowercase())
            }),
        },
        Check::HasSections => {
            let markdown = answer.map_or("", |(markdown, _)| markdown);
            let missing: Vec<String> = [SOURCE_HEADING, SUMMARY_HEADING]
                .into_iter()
                .filter(|heading| !markdown.lines().any(|line| line.trim() == *heading))
                .map(str::to_string)
                .collect();
            CheckOutcome::HasSections {
                passed: answer.is_some() && missing.is_empty(),
                missing,
            }
        }
        Check::SourceUrlContains { text } => {
            let source_url = answer.map(|(_, url)| url.to_string());
            CheckOutcome::SourceUrlContains {
                text: text.clone(),
                passed: source_url.as_deref().is_some_and(|url| url.contains(text.as_str())),
                source_url,
            }
        }
    }
}

pub fn write_judgment(path: &Path, judgment: &Judgment) -> Result<()> {
    let contents = serde_json::to_string_pretty(judgment).context("serialize checks")?;
    fs::write(path, format!("{contents}\n"))
        .with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answered() -> DriverOutcome {
        DriverOutcome::Answered {
            markdown: "## Source URL\nhttps://countyx.gov/trees\n\n## Summary\nA Street Tree Permit is required."
                .to_string(),
            source_url: "https://countyx.gov/trees".to_string(),
        }
    }

    fn all_checks() -> Vec<Check> {
        vec![
            Check::Answered,
            Check::AnswerContains {
                text: "street tree permit".to_string(),
            },
            Check::HasSections,
            Check::SourceUrlContains {
                text: ".gov".to_string(),
            },
        ]
    }

    #[test]
    fn answered_run_passes_all_checks() {
        let judgment = run_checks(&all_checks(), &answered());
        assert!(judgment.all_passed(), "{judgment:?}");
    }

    #[test]
    fn fallback_answer_fails_every_check() {
        let judgment = run_checks(&all_checks(), &DriverOutcome::NoAnswer);
        assert!(judgment.checks.iter().all(|check| !check.passed()));
    }

    #[test]
    fn missing_summary_is_reported() {
        let outcome = DriverOutcome::Answered {
            markdown: "## Source URL\nhttps://countyx.gov/trees".to_string(),
            source_url: "https://countyx.gov/trees".to_string(),
        };
        let judgment = run_checks(&[Check::HasSections], &outcome);
        match &judgment.checks[0] {
            CheckOutcome::HasSections { passed, missing } => {
                assert!(!*passed);
                assert_eq!(missing, &vec!["## Summary".to_string()]);
            }
            other => panic!("expected has_sections, got {other:?}"),
        }
    }

    #[test]
    fn source_url_check_records_url() {
        let judgment = run_checks(
            &[Check::SourceUrlContains {
                text: "state.gov".to_string(),
            }],
            &answered(),
        );
        match &judgment.checks[0] {
            CheckOutcome::SourceUrlContains {
                passed, source_url, ..
            } => {
                assert!(!*passed);
                assert_eq!(source_url.as_deref(), Some("https://countyx.gov/trees"));
            }
            other => panic!("expected source_url_contains, got {other:?}"),
        }
    }
}
