//! Test-only helpers: a scripted model backend and reply builders.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use anyhow::anyhow;
use futures::StreamExt;
use futures::stream;
use serde_json::json;

use crate::core::types::StageName;
use crate::io::backend::{ModelBackend, ModelEvent, ModelRequest, ModelStream};
use crate::io::config::PipelineConfig;
use crate::pipeline::Pipeline;

/// One scripted answer for a stage.
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    /// Tool invocations reported before the reply.
    pub tools: Vec<String>,
    /// Reply text, or an error message the invocation fails with.
    pub reply: Result<String, String>,
}

impl ScriptedReply {
    pub fn ok(reply: impl Into<String>) -> Self {
        Self {
            tools: Vec::new(),
            reply: Ok(reply.into()),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            tools: Vec::new(),
            reply: Err(message.into()),
        }
    }

    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = tools.iter().map(|t| t.to_string()).collect();
        self
    }
}

/// Backend that replays scripted replies per stage, in order, and records requests.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    replies: Mutex<HashMap<StageName, VecDeque<ScriptedReply>>>,
    requests: Mutex<Vec<ModelRequest>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a reply for `stage`.
    pub fn with(self, stage: StageName, reply: ScriptedReply) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .entry(stage)
            .or_default()
            .push_back(reply);
        self
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Number of requests received for `stage`.
    pub fn calls(&self, stage: StageName) -> usize {
        self.requests
            .lock()
            .expect("requests lock")
            .iter()
            .filter(|r| r.stage == stage)
            .count()
    }
}

impl ModelBackend for ScriptedBackend {
    fn invoke(&self, request: ModelRequest) -> ModelStream<'_> {
        let stage = request.stage;
        self.requests.lock().expect("requests lock").push(request);
        let next = self
            .replies
            .lock()
            .expect("replies lock")
            .get_mut(&stage)
            .and_then(VecDeque::pop_front);
        let Some(scripted) = next else {
            return stream::iter([Err(anyhow!("no scripted reply for {stage}"))]).boxed();
        };
        let mut events: Vec<anyhow::Result<ModelEvent>> = scripted
            .tools
            .into_iter()
            .map(|name| Ok(ModelEvent::ToolCall { name }))
            .collect();
        events.push(match scripted.reply {
            Ok(text) => Ok(ModelEvent::Reply(text)),
            Err(message) => Err(anyhow!(message)),
        });
        stream::iter(events).boxed()
    }
}

/// Pipeline over a scripted backend with default settings.
pub fn scripted_pipeline(backend: ScriptedBackend) -> Pipeline<ScriptedBackend> {
    Pipeline::new(backend, &PipelineConfig::default())
}

/// Search or Refinement reply choosing `url` with `content`.
pub fn search_reply(query: &str, url: &str, content: &str) -> String {
    json!({
        "search_results": [url],
        "url": url,
        "raw_content": content,
        "query": query,
        "timestamp": "2025-01-15",
        "reasoning": format!("{url} looked most relevant."),
    })
    .to_string()
}

/// Validation reply.
pub fn verdict_reply(analysis: &str, confidence: f64, relevant: bool, approved: bool) -> String {
    json!({
        "analysis": analysis,
        "confidence_score": confidence,
        "relevant": relevant,
        "approved": approved,
    })
    .to_string()
}

/// Synthesis reply.
pub fn synthesis_reply(source_url: &str, summary: &str) -> String {
    json!({ "source_url": source_url, "summary": summary }).to_string()
}
