use anyhow::{Context, Result, bail};

use crate::core::progress::EXIT_LOOP_TOOL;
use crate::core::types::{ExitDecision, RefinementOutput, StageName};
use crate::session::Session;
use crate::stages::{Stage, StageContext, StagePlan};

/// Decides whether the research loop ends. Never touches content.
///
/// Raises the `exit_loop` tool event exactly when it terminates.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExitCheckStage;

impl Stage for ExitCheckStage {
    type Output = ExitDecision;

    const NAME: StageName = StageName::ExitCheck;

    fn plan(&self, _ctx: &StageContext, session: &Session) -> Result<StagePlan<ExitDecision>> {
        let refinement = session
            .refinement
            .as_ref()
            .context("no refinement output to check")?;
        Ok(match refinement {
            RefinementOutput::PassThrough(verdict) if verdict.carries_content() => {
                StagePlan::Settled {
                    output: ExitDecision::Terminate(verdict.clone()),
                    tool_calls: vec![EXIT_LOOP_TOOL.to_string()],
                }
            }
            _ => StagePlan::Settled {
                output: ExitDecision::Continue,
                tool_calls: Vec::new(),
            },
        })
    }

    fn parse(&self, _ctx: &StageContext, _session: &Session, _reply: &str) -> Result<ExitDecision> {
        bail!("exit check does not consult the model")
    }

    fn record(&self, _session: &mut Session, _output: &ExitDecision) {}

    fn render(&self, output: &ExitDecision) -> String {
        match output {
            ExitDecision::Terminate(verdict) => verdict.raw_content.clone(),
            ExitDecision::Continue => String::new(),
        }
    }
}
