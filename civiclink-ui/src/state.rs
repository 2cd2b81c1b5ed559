//! Shared application state for the UI server.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use civiclink::core::progress::ProgressUpdate;
use civiclink::io::backend::ModelBackend;
use civiclink::pipeline::Pipeline;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::debug;

pub type SharedPipeline = Arc<Pipeline<Box<dyn ModelBackend>>>;

/// Events broadcast to SSE clients while queries run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunEvent {
    Progress {
        run_id: String,
        update: ProgressUpdate,
    },
    Answer {
        run_id: String,
        markdown: String,
        source_url: String,
    },
    /// The workflow ended without an answer.
    NoAnswer { run_id: String, message: String },
    Failed {
        run_id: String,
        message: String,
        error: String,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> &str {
        match self {
            RunEvent::Progress { run_id, .. }
            | RunEvent::Answer { run_id, .. }
            | RunEvent::NoAnswer { run_id, .. }
            | RunEvent::Failed { run_id, .. } => run_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Answered,
    NoAnswer,
    Failed,
}

/// In-memory record of one submitted query.
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    pub run_id: String,
    pub user_id: String,
    pub query: String,
    pub status: RunStatus,
    /// Progress labels in the order they were reported.
    pub progress: Vec<String>,
    /// Markdown answer or fallback text once finished.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Finished runs kept for polling before the oldest are evicted.
pub const DEFAULT_FINISHED_RUN_LIMIT: usize = 100;

/// Run records keyed by id. Running records are always kept; finished ones
/// are evicted oldest-first past `finished_limit`.
#[derive(Debug)]
pub struct RunStore {
    records: HashMap<String, RunRecord>,
    finished: VecDeque<String>,
    finished_limit: usize,
}

impl RunStore {
    pub fn new(finished_limit: usize) -> Self {
        Self {
            records: HashMap::new(),
            finished: VecDeque::new(),
            finished_limit,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn mark_finished(&mut self, run_id: &str) {
        self.finished.push_back(run_id.to_string());
        while self.finished.len() > self.finished_limit {
            if let Some(evicted) = self.finished.pop_front() {
                self.records.remove(&evicted);
                debug!(run_id = %evicted, "evicted finished run");
            }
        }
    }
}

/// Shared state accessible from all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: SharedPipeline,
    /// Broadcast sender for run events.
    pub event_tx: Arc<broadcast::Sender<RunEvent>>,
    pub runs: Arc<RwLock<RunStore>>,
}

impl AppState {
    pub fn new(pipeline: SharedPipeline) -> Self {
        Self::with_finished_limit(pipeline, DEFAULT_FINISHED_RUN_LIMIT)
    }

    pub fn with_finished_limit(pipeline: SharedPipeline, finished_limit: usize) -> Self {
        let (event_tx, _) = broadcast::channel(256);
        Self {
            pipeline,
            event_tx: Arc::new(event_tx),
            runs: Arc::new(RwLock::new(RunStore::new(finished_limit))),
        }
    }

    pub fn run(&self, run_id: &str) -> Option<RunRecord> {
        self.runs.read().ok()?.records.get(run_id).cloned()
    }

    /// Apply `f` to a run record, if present.
    pub fn update_run(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) {
        if let Ok(mut runs) = self.runs.write()
            && let Some(record) = runs.records.get_mut(run_id)
        {
            f(record);
        }
    }

    /// Apply the final update to a run and queue it for eviction.
    pub fn finish_run(&self, run_id: &str, f: impl FnOnce(&mut RunRecord)) {
        if let Ok(mut runs) = self.runs.write()
            && let Some(record) = runs.records.get_mut(run_id)
        {
            f(record);
            runs.mark_finished(run_id);
        }
    }

    pub fn insert_run(&self, record: RunRecord) {
        if let Ok(mut runs) = self.runs.write() {
            runs.records.insert(record.run_id.clone(), record);
        }
    }

    /// Broadcast an event. Having no subscribers is not an error.
    pub fn publish(&self, event: RunEvent) {
        let _ = self.event_tx.send(event);
    }
}
