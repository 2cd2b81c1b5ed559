//! Sequential controller: Search, the research loop, then Synthesis, once per query.

use std::pin::pin;

use anyhow::{Result, anyhow};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::info;

use crate::core::types::{PipelineEvent, SynthesisResult};
use crate::io::backend::ModelBackend;
use crate::io::config::PipelineConfig;
use crate::research_loop::{LoopItem, ResearchLoop};
use crate::session::Session;
use crate::stages::{SearchStage, StageContext, StageItem, SynthesisStage, run_stage};

/// Item produced while a query runs.
#[derive(Debug, Clone)]
pub enum RunItem {
    Event(PipelineEvent),
    /// Synthesis finished. Nothing of interest follows.
    Answer(SynthesisResult),
}

/// The fixed research workflow bound to a model backend.
pub struct Pipeline<B> {
    backend: B,
    ctx: StageContext,
    research: ResearchLoop,
}

impl<B: ModelBackend> Pipeline<B> {
    pub fn new(backend: B, config: &PipelineConfig) -> Self {
        Self {
            backend,
            ctx: StageContext::from_config(config),
            research: ResearchLoop::new(config.max_iterations),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Run the workflow for `session`, streaming events and ending with the answer.
    pub fn run<'a>(&'a self, session: &'a mut Session) -> impl Stream<Item = Result<RunItem>> + 'a {
        try_stream! {
            info!(session_id = %session.id, "pipeline started");

            {
                let mut stage = pin!(run_stage(&SearchStage, &self.ctx, &self.backend, &mut *session));
                while let Some(item) = stage.next().await {
                    if let StageItem::Event(event) = item? {
                        yield RunItem::Event(event);
                    }
                }
            }

            {
                let mut research = pin!(self.research.run(&self.ctx, &self.backend, &mut *session));
                while let Some(item) = research.next().await {
                    if let LoopItem::Event(event) = item? {
                        yield RunItem::Event(event);
                    }
                }
            }

            let mut answer = None;
            {
                let mut stage = pin!(run_stage(&SynthesisStage, &self.ctx, &self.backend, &mut *session));
                while let Some(item) = stage.next().await {
                    match item? {
                        StageItem::Event(event) => {
                            yield RunItem::Event(event);
                        }
                        StageItem::Output(result) => answer = Some(result),
                    }
                }
            }

            let answer = answer.ok_or_else(|| anyhow!("synthesis stage produced no output"))?;
            info!(session_id = %session.id, source_url = %answer.source_url, "pipeline finished");
            yield RunItem::Answer(answer);
        }
    }
}
