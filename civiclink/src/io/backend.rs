//! Model backend abstraction.
//!
//! The [`ModelBackend`] trait decouples the stages from the actual model
//! service (currently `codex exec`). A backend answers one request with an
//! asynchronous stream of events: zero or more tool invocations, then the reply.
//! Tests use scripted backends that replay predetermined replies without
//! spawning processes.

use anyhow::Result;
use futures::stream::BoxStream;
use serde::Serialize;

use crate::core::types::StageName;
use crate::io::config::ModelSettings;

/// Capabilities a stage may grant the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tool {
    /// Query text to a ranked list of URLs.
    WebSearch,
    /// URL to fetched page text.
    FetchPage,
}

impl Tool {
    pub fn as_str(self) -> &'static str {
        match self {
            Tool::WebSearch => "web_search",
            Tool::FetchPage => "fetch_page",
        }
    }
}

/// Parameters for one model invocation.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub stage: StageName,
    /// Rendered prompt text.
    pub prompt: String,
    pub tools: Vec<Tool>,
    /// JSON Schema the reply must conform to.
    pub output_schema: &'static str,
    pub settings: ModelSettings,
}

/// Event delivered by a backend while it answers a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelEvent {
    /// The model invoked a tool.
    ToolCall { name: String },
    /// Final reply text. Always the last event of a successful invocation.
    Reply(String),
}

pub type ModelStream<'a> = BoxStream<'a, Result<ModelEvent>>;

/// Abstraction over model invocation backends.
pub trait ModelBackend: Send + Sync {
    /// Start answering `request`. Errors surface as stream items.
    fn invoke(&self, request: ModelRequest) -> ModelStream<'_>;
}

impl<B: ModelBackend + ?Sized> ModelBackend for Box<B> {
    fn invoke(&self, request: ModelRequest) -> ModelStream<'_> {
        (**self).invoke(request)
    }
}
