//! Loop controller: Validation, Refinement and Exit-Check until approval or the cap.

use std::pin::pin;

use anyhow::Result;
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::core::loop_state::{LoopPhase, LoopState};
use crate::core::types::{ExitDecision, PipelineEvent, RefinementOutput};
use crate::io::backend::ModelBackend;
use crate::session::Session;
use crate::stages::{
    ExitCheckStage, RefinementStage, StageContext, StageItem, ValidationStage, run_stage,
};

/// Final state of the research loop, recorded on the session for Synthesis.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopOutcome {
    pub phase: LoopPhase,
    /// Passes that ran a fresh search.
    pub refinements: u32,
    pub source_url: String,
    /// Approved content, or the latest candidate's content when capped.
    pub content: String,
    pub approved: bool,
}

impl LoopOutcome {
    /// Full Validation, Refinement and Exit-Check passes that ran.
    pub fn iterations(&self) -> u32 {
        self.phase.iteration()
    }
}

/// Item produced while the loop runs.
#[derive(Debug)]
pub enum LoopItem {
    Event(PipelineEvent),
    /// Always last.
    Finished(LoopOutcome),
}

/// Bounded retry loop over the validation and refinement stages.
#[derive(Debug, Clone, Copy)]
pub struct ResearchLoop {
    cap: u32,
}

impl ResearchLoop {
    pub fn new(cap: u32) -> Self {
        Self { cap }
    }

    /// Run the loop seeded with the session's current candidate.
    pub fn run<'a, B: ModelBackend + ?Sized>(
        &'a self,
        ctx: &'a StageContext,
        backend: &'a B,
        session: &'a mut Session,
    ) -> impl Stream<Item = Result<LoopItem>> + 'a {
        try_stream! {
            let mut state = LoopState::new(self.cap);
            let mut refinements = 0u32;
            let mut approved = None;

            while state.is_running() {
                debug!(iteration = state.iteration(), cap = state.cap(), "research pass");

                {
                    let mut stage = pin!(run_stage(&ValidationStage, ctx, backend, &mut *session));
                    while let Some(item) = stage.next().await {
                        if let StageItem::Event(event) = item? {
                            yield LoopItem::Event(event);
                        }
                    }
                }

                {
                    let mut stage = pin!(run_stage(&RefinementStage, ctx, backend, &mut *session));
                    while let Some(item) = stage.next().await {
                        match item? {
                            StageItem::Event(event) => {
                                yield LoopItem::Event(event);
                            }
                            StageItem::Output(RefinementOutput::Refined(_)) => refinements += 1,
                            StageItem::Output(RefinementOutput::PassThrough(_)) => {}
                        }
                    }
                }

                let mut decision = ExitDecision::Continue;
                {
                    let mut stage = pin!(run_stage(&ExitCheckStage, ctx, backend, &mut *session));
                    while let Some(item) = stage.next().await {
                        match item? {
                            StageItem::Event(event) => {
                                yield LoopItem::Event(event);
                            }
                            StageItem::Output(output) => decision = output,
                        }
                    }
                }

                if let ExitDecision::Terminate(verdict) = &decision {
                    approved = Some(verdict.clone());
                }
                state.advance(&decision);
            }

            let outcome = match approved {
                Some(verdict) => LoopOutcome {
                    phase: state.phase(),
                    refinements,
                    source_url: session
                        .candidate
                        .as_ref()
                        .map(|c| c.url.clone())
                        .unwrap_or_default(),
                    content: verdict.raw_content,
                    approved: true,
                },
                None => {
                    let candidate = session.candidate.clone().unwrap_or_default();
                    warn!(
                        iterations = state.iteration(),
                        url = %candidate.url,
                        "research loop capped without approval, carrying best effort content"
                    );
                    LoopOutcome {
                        phase: state.phase(),
                        refinements,
                        source_url: candidate.url,
                        content: candidate.raw_content,
                        approved: false,
                    }
                }
            };
            info!(
                state = outcome.phase.as_str(),
                iterations = outcome.iterations(),
                refinements,
                "research loop finished"
            );
            session.research = Some(outcome.clone());
            yield LoopItem::Finished(outcome);
        }
    }
}
