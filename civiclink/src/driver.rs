//! Run driver: opens a session, runs the pipeline and extracts the answer.
//!
//! This is the only error boundary. Every failure inside the pipeline ends up
//! as a [`DriverOutcome`]; nothing propagates to the caller.

use std::pin::pin;

use anyhow::Result;
use futures::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::core::progress::{ProgressTracker, ProgressUpdate};
use crate::io::backend::ModelBackend;
use crate::pipeline::{Pipeline, RunItem};
use crate::session::Session;

/// Returned when the workflow ends without a synthesized answer.
pub const FALLBACK_ANSWER: &str = "The agentic workflow did not produce a final answer.";

/// Shown to the user when the workflow fails.
pub const ERROR_ANSWER: &str =
    "An error occurred during the execution. Please check the logs or try again.";

/// How a query run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverOutcome {
    /// Markdown answer from the Synthesis stage, trimmed.
    Answered { markdown: String, source_url: String },
    /// The stream ended without an answer.
    NoAnswer,
    /// The pipeline failed; `error` carries the full error chain.
    Failed { error: String },
}

impl DriverOutcome {
    /// Text shown to the user.
    pub fn text(&self) -> &str {
        match self {
            DriverOutcome::Answered { markdown, .. } => markdown,
            DriverOutcome::NoAnswer => FALLBACK_ANSWER,
            DriverOutcome::Failed { .. } => ERROR_ANSWER,
        }
    }

    pub fn is_answered(&self) -> bool {
        matches!(self, DriverOutcome::Answered { .. })
    }
}

/// Consume a run stream until its answer, reporting progress along the way.
///
/// Stops polling as soon as the answer arrives.
pub async fn consume<S, F>(stream: S, mut on_progress: F) -> DriverOutcome
where
    S: Stream<Item = Result<RunItem>>,
    F: FnMut(&ProgressUpdate),
{
    let mut stream = pin!(stream);
    let mut tracker = ProgressTracker::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(RunItem::Event(event)) => {
                for update in tracker.observe(&event) {
                    debug!(stage = %event.stage, update = %update, "progress");
                    on_progress(&update);
                }
            }
            Ok(RunItem::Answer(answer)) => {
                return DriverOutcome::Answered {
                    markdown: answer.to_markdown().trim().to_string(),
                    source_url: answer.source_url,
                };
            }
            Err(err) => {
                error!(error = %format!("{err:#}"), "workflow failed");
                return DriverOutcome::Failed {
                    error: format!("{err:#}"),
                };
            }
        }
    }
    warn!("workflow ended without a final answer");
    DriverOutcome::NoAnswer
}

/// Run one query in a fresh session.
pub async fn run_query<B, F>(
    pipeline: &Pipeline<B>,
    user_id: &str,
    query: &str,
    on_progress: F,
) -> DriverOutcome
where
    B: ModelBackend,
    F: FnMut(&ProgressUpdate),
{
    let mut session = Session::new(user_id, query);
    info!(session_id = %session.id, user_id, "query submitted");
    let outcome = consume(pipeline.run(&mut session), on_progress).await;
    info!(
        session_id = %session.id,
        answered = outcome.is_answered(),
        "query finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;
    use futures::stream;

    use super::*;
    use crate::core::types::{PipelineEvent, StageName, SynthesisResult};

    fn answer() -> RunItem {
        RunItem::Answer(SynthesisResult {
            source_url: "https://countyx.gov/trees".to_string(),
            summary: "Planting is allowed.\n\n".to_string(),
        })
    }

    /// Verifies an exhausted stream without an answer yields the exact fallback text.
    #[tokio::test]
    async fn stream_without_answer_returns_fallback() {
        let items = vec![
            Ok(RunItem::Event(PipelineEvent::started(StageName::Search))),
            Ok(RunItem::Event(PipelineEvent::output(StageName::Search, "{}"))),
        ];
        let outcome = consume(stream::iter(items), |_| {}).await;
        assert_eq!(outcome, DriverOutcome::NoAnswer);
        assert_eq!(
            outcome.text(),
            "The agentic workflow did not produce a final answer."
        );
    }

    /// Verifies consumption stops at the answer and ignores anything after it.
    #[tokio::test]
    async fn stops_at_answer() {
        let items = vec![
            Ok(answer()),
            Err(anyhow!("must not be reached")),
        ];
        let outcome = consume(stream::iter(items), |_| {}).await;
        assert_eq!(
            outcome,
            DriverOutcome::Answered {
                markdown: "## Source URL\nhttps://countyx.gov/trees\n\n## Summary\nPlanting is allowed."
                    .to_string(),
                source_url: "https://countyx.gov/trees".to_string(),
            }
        );
    }

    /// Verifies a stream error becomes the error answer with the cause preserved.
    #[tokio::test]
    async fn stream_error_is_contained() {
        let items = vec![
            Ok(RunItem::Event(PipelineEvent::started(StageName::Validation))),
            Err(anyhow!("backend unavailable").context("validation stage")),
        ];
        let outcome = consume(stream::iter(items), |_| {}).await;
        assert_eq!(outcome.text(), ERROR_ANSWER);
        match outcome {
            DriverOutcome::Failed { error } => {
                assert!(error.contains("validation stage"));
                assert!(error.contains("backend unavailable"));
            }
            other => panic!("expected failure, got {other:?}"),
        }
    }

    /// Verifies progress labels are reported for known stages only.
    #[tokio::test]
    async fn reports_progress_labels() {
        let items = vec![
            Ok(RunItem::Event(PipelineEvent::started(StageName::Search))),
            Ok(RunItem::Event(PipelineEvent::started(StageName::ExitCheck))),
            Ok(RunItem::Event(PipelineEvent::started(StageName::Synthesis))),
            Ok(answer()),
        ];
        let mut labels = Vec::new();
        let outcome = consume(stream::iter(items), |update| labels.push(update.to_string())).await;
        assert!(outcome.is_answered());
        assert_eq!(
            labels,
            vec!["Searching the web for a source...", "Writing the summary..."]
        );
    }
}
