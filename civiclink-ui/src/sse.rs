//! Server-Sent Events stream of run progress and results.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use civiclink::core::progress::ProgressUpdate;
use futures::stream::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::{AppState, RunEvent};

#[derive(Debug, Default, Deserialize)]
pub struct EventsQuery {
    /// Only forward events for this run.
    pub run_id: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    run_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl SsePayload {
    fn new(event_type: &'static str, run_id: &str) -> Self {
        Self {
            event_type,
            run_id: run_id.to_string(),
            stage: None,
            text: None,
            source_url: None,
            error: None,
        }
    }
}

impl From<&RunEvent> for SsePayload {
    fn from(event: &RunEvent) -> Self {
        match event {
            RunEvent::Progress { run_id, update } => {
                let stage = match update {
                    ProgressUpdate::Stage { stage, .. } | ProgressUpdate::Tool { stage, .. } => stage,
                };
                SsePayload {
                    stage: Some(stage.as_str().to_string()),
                    text: Some(update.text().to_string()),
                    ..SsePayload::new("progress", run_id)
                }
            }
            RunEvent::Answer {
                run_id,
                markdown,
                source_url,
            } => SsePayload {
                text: Some(markdown.clone()),
                source_url: Some(source_url.clone()),
                ..SsePayload::new("answer", run_id)
            },
            RunEvent::NoAnswer { run_id, message } => SsePayload {
                text: Some(message.clone()),
                ..SsePayload::new("answer", run_id)
            },
            RunEvent::Failed {
                run_id,
                message,
                error,
            } => SsePayload {
                text: Some(message.clone()),
                error: Some(error.clone()),
                ..SsePayload::new("error", run_id)
            },
        }
    }
}

/// Convert a broadcast event into an SSE event, honoring the run filter.
fn to_sse_event(event: &RunEvent, filter: Option<&str>) -> Option<Event> {
    if filter.is_some_and(|run_id| run_id != event.run_id()) {
        return None;
    }
    let payload = SsePayload::from(event);
    let json = serde_json::to_string(&payload).ok()?;
    Some(Event::default().event(payload.event_type).data(json))
}

/// SSE endpoint handler.
pub async fn events_handler(
    State(state): State<AppState>,
    Query(query): Query<EventsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();
    let filter = query.run_id;

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(run_event) => {
                    if let Some(event) = to_sse_event(&run_event, filter.as_deref()) {
                        yield Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

#[cfg(test)]
mod tests {
    use civiclink::core::types::StageName;

    use super::*;

    fn progress(run_id: &str) -> RunEvent {
        RunEvent::Progress {
            run_id: run_id.to_string(),
            update: ProgressUpdate::Stage {
                stage: StageName::Validation,
                label: "Checking the source's credibility...".to_string(),
            },
        }
    }

    #[test]
    fn progress_payload_carries_stage_and_label() {
        let payload = SsePayload::from(&progress("run-a"));
        assert_eq!(payload.event_type, "progress");
        assert_eq!(payload.run_id, "run-a");
        assert_eq!(payload.stage.as_deref(), Some("validation"));
        assert_eq!(
            payload.text.as_deref(),
            Some("Checking the source's credibility...")
        );
    }

    #[test]
    fn failure_payload_shows_generic_message_and_error() {
        let event = RunEvent::Failed {
            run_id: "run-b".to_string(),
            message: civiclink::driver::ERROR_ANSWER.to_string(),
            error: "search stage failed: boom".to_string(),
        };
        let json = serde_json::to_value(SsePayload::from(&event)).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["text"], civiclink::driver::ERROR_ANSWER);
        assert_eq!(json["error"], "search stage failed: boom");
        assert!(json.get("source_url").is_none());
    }

    #[test]
    fn no_answer_is_sent_as_answer_with_fallback_text() {
        let event = RunEvent::NoAnswer {
            run_id: "run-c".to_string(),
            message: civiclink::driver::FALLBACK_ANSWER.to_string(),
        };
        let payload = SsePayload::from(&event);
        assert_eq!(payload.event_type, "answer");
        assert_eq!(
            payload.text.as_deref(),
            Some(civiclink::driver::FALLBACK_ANSWER)
        );
    }

    #[test]
    fn run_filter_drops_other_runs() {
        assert!(to_sse_event(&progress("run-a"), Some("run-a")).is_some());
        assert!(to_sse_event(&progress("run-a"), Some("run-b")).is_none());
        assert!(to_sse_event(&progress("run-a"), None).is_some());
    }
}
