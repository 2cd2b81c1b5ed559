//! HTTP route handlers for the UI API.

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use civiclink::driver::{DriverOutcome, run_query};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::{AppState, RunEvent, RunRecord, RunStatus};

/// Build the API router.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/ask", post(ask))
        .route("/runs/{run_id}", get(get_run))
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
pub(crate) struct AskRequest {
    query: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AskResponse {
    run_id: String,
    user_id: String,
}

/// POST /api/ask - start a query run in the background.
///
/// Progress and the final answer arrive over `/events`; the run record can
/// also be polled at `/api/runs/{run_id}`.
async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<(StatusCode, Json<AskResponse>), StatusCode> {
    let query = request.query.trim().to_string();
    if query.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    let user_id = request
        .user_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let run_id = Uuid::new_v4().to_string();

    state.insert_run(RunRecord {
        run_id: run_id.clone(),
        user_id: user_id.clone(),
        query: query.clone(),
        status: RunStatus::Running,
        progress: Vec::new(),
        answer: None,
        error: None,
    });
    info!(run_id = %run_id, user_id = %user_id, "run accepted");

    tokio::spawn(execute_run(
        state,
        run_id.clone(),
        user_id.clone(),
        query,
    ));

    Ok((StatusCode::ACCEPTED, Json(AskResponse { run_id, user_id })))
}

/// Run one query to completion, mirroring progress into the run record and
/// the event channel.
pub(crate) async fn execute_run(state: AppState, run_id: String, user_id: String, query: String) {
    let outcome = run_query(&*state.pipeline, &user_id, &query, |update| {
        state.update_run(&run_id, |record| record.progress.push(update.text().to_string()));
        state.publish(RunEvent::Progress {
            run_id: run_id.clone(),
            update: update.clone(),
        });
    })
    .await;

    let text = outcome.text().to_string();
    let event = match outcome {
        DriverOutcome::Answered {
            markdown,
            source_url,
        } => {
            state.finish_run(&run_id, |record| {
                record.status = RunStatus::Answered;
                record.answer = Some(markdown.clone());
            });
            RunEvent::Answer {
                run_id: run_id.clone(),
                markdown,
                source_url,
            }
        }
        DriverOutcome::NoAnswer => {
            state.finish_run(&run_id, |record| {
                record.status = RunStatus::NoAnswer;
                record.answer = Some(text.clone());
            });
            RunEvent::NoAnswer {
                run_id: run_id.clone(),
                message: text,
            }
        }
        DriverOutcome::Failed { error } => {
            warn!(run_id = %run_id, error = %error, "run failed");
            state.finish_run(&run_id, |record| {
                record.status = RunStatus::Failed;
                record.answer = Some(text.clone());
                record.error = Some(error.clone());
            });
            RunEvent::Failed {
                run_id: run_id.clone(),
                message: text,
                error,
            }
        }
    };
    state.publish(event);
    info!(run_id = %run_id, "run finished");
}

/// GET /api/runs/{run_id} - returns the run record.
async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunRecord>, StatusCode> {
    state.run(&run_id).map(Json).ok_or(StatusCode::NOT_FOUND)
}
