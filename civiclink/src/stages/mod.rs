//! Stage contract and the driver that runs one stage against a session.
//!
//! A stage either asks the model backend for a structured reply
//! ([`StagePlan::Invoke`]) or settles its output from session state alone
//! ([`StagePlan::Settled`]). Either way it emits a start event, one event per
//! tool invocation and a final output event, then records its output on the
//! session.

mod exit_check;
mod refinement;
mod search;
mod synthesis;
mod validation;

use anyhow::{Context, Result, anyhow};
use async_stream::try_stream;
use futures::{Stream, StreamExt};
use tracing::debug;

use crate::core::types::{PipelineEvent, StageName};
use crate::core::verdict::ApprovalPolicy;
use crate::io::backend::{ModelBackend, ModelEvent, ModelRequest, Tool};
use crate::io::config::{PipelineConfig, StageSettings};
use crate::io::prompt::PromptBuilder;
use crate::session::Session;

pub use exit_check::ExitCheckStage;
pub use refinement::RefinementStage;
pub use search::SearchStage;
pub use synthesis::SynthesisStage;
pub use validation::ValidationStage;

pub const SEARCH_RESULT_SCHEMA: &str = include_str!("../../schemas/search_result.schema.json");
pub const VALIDATION_VERDICT_SCHEMA: &str =
    include_str!("../../schemas/validation_verdict.schema.json");
pub const SYNTHESIS_RESULT_SCHEMA: &str =
    include_str!("../../schemas/synthesis_result.schema.json");

/// Settings every stage reads while planning.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub prompts: PromptBuilder,
    pub settings: StageSettings,
    pub policy: ApprovalPolicy,
    pub stale_after_days: i64,
}

impl StageContext {
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            prompts: PromptBuilder::new(config.prompt_budget_bytes),
            settings: config.stages.clone(),
            policy: ApprovalPolicy {
                threshold: config.approval_threshold,
            },
            stale_after_days: config.stale_after_days,
        }
    }

    /// Model request for `stage` with its configured settings.
    pub fn request(
        &self,
        stage: StageName,
        prompt: String,
        tools: Vec<Tool>,
        output_schema: &'static str,
    ) -> ModelRequest {
        ModelRequest {
            stage,
            prompt,
            tools,
            output_schema,
            settings: self.settings.for_stage(stage).cloned().unwrap_or_default(),
        }
    }
}

/// How a stage produces its output for the current session state.
#[derive(Debug)]
pub enum StagePlan<T> {
    Invoke(ModelRequest),
    /// Output decided without the model, with the tool invocations it implies.
    Settled { output: T, tool_calls: Vec<String> },
}

/// A named unit of work over the session.
pub trait Stage {
    type Output;

    const NAME: StageName;

    fn plan(&self, ctx: &StageContext, session: &Session) -> Result<StagePlan<Self::Output>>;

    /// Turn the model reply into the stage output.
    fn parse(&self, ctx: &StageContext, session: &Session, reply: &str) -> Result<Self::Output>;

    /// Write the output to the session.
    fn record(&self, session: &mut Session, output: &Self::Output);

    /// Text payload of the stage's output event.
    fn render(&self, output: &Self::Output) -> String;
}

/// Item produced while a stage runs.
#[derive(Debug)]
pub enum StageItem<T> {
    Event(PipelineEvent),
    /// The stage's output, already recorded on the session. Always last.
    Output(T),
}

/// Run one stage to completion, streaming its events.
pub fn run_stage<'a, S, B>(
    stage: &'a S,
    ctx: &'a StageContext,
    backend: &'a B,
    session: &'a mut Session,
) -> impl Stream<Item = Result<StageItem<S::Output>>> + 'a
where
    S: Stage,
    B: ModelBackend + ?Sized,
{
    try_stream! {
        yield StageItem::Event(PipelineEvent::started(S::NAME));

        let output = match stage.plan(ctx, session)? {
            StagePlan::Settled { output, tool_calls } => {
                debug!(stage = %S::NAME, "stage settled without the model");
                for tool in tool_calls {
                    yield StageItem::Event(PipelineEvent::tool_call(S::NAME, tool));
                }
                output
            }
            StagePlan::Invoke(request) => {
                let mut reply = None;
                let mut events = backend.invoke(request);
                while let Some(event) = events.next().await {
                    match event.with_context(|| format!("{} stage", S::NAME))? {
                        ModelEvent::ToolCall { name } => {
                            yield StageItem::Event(PipelineEvent::tool_call(S::NAME, name));
                        }
                        ModelEvent::Reply(text) => {
                            reply = Some(text);
                            break;
                        }
                    }
                }
                let reply = reply.ok_or_else(|| {
                    anyhow!("{} stage: model stream ended without a reply", S::NAME)
                })?;
                stage
                    .parse(ctx, session, &reply)
                    .with_context(|| format!("{} stage: invalid model reply", S::NAME))?
            }
        };

        stage.record(session, &output);
        yield StageItem::Event(PipelineEvent::output(S::NAME, stage.render(&output)));
        yield StageItem::Output(output);
    }
}

/// Pretty JSON for event payloads; falls back to debug output.
fn to_payload<T: serde::Serialize + std::fmt::Debug>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| format!("{value:?}"))
}
