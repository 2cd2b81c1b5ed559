use anyhow::{Context, Result};
use tracing::debug;

use crate::core::reply::parse_reply;
use crate::core::types::{RefinementOutput, StageName};
use crate::io::backend::Tool;
use crate::io::prompt::RefinementInputs;
use crate::session::Session;
use crate::stages::search::normalize_candidate;
use crate::stages::{SEARCH_RESULT_SCHEMA, Stage, StageContext, StagePlan, to_payload};

/// Searches again, steering away from the deficiency of the rejected source.
///
/// An approved verdict is passed through unchanged without calling the model.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefinementStage;

impl Stage for RefinementStage {
    type Output = RefinementOutput;

    const NAME: StageName = StageName::Refinement;

    fn plan(&self, ctx: &StageContext, session: &Session) -> Result<StagePlan<RefinementOutput>> {
        let verdict = session
            .verdict
            .as_ref()
            .context("no validation verdict to refine from")?;
        if verdict.carries_content() {
            debug!("verdict approved, passing it through");
            return Ok(StagePlan::Settled {
                output: RefinementOutput::PassThrough(verdict.clone()),
                tool_calls: Vec::new(),
            });
        }

        let rejected_url = session
            .candidate
            .as_ref()
            .map(|c| c.url.as_str())
            .unwrap_or_default();
        let prompt = ctx.prompts.build_refinement(&RefinementInputs {
            query: &session.query,
            verdict,
            rejected_url,
            rejected: &session.rejected,
        })?;
        Ok(StagePlan::Invoke(ctx.request(
            Self::NAME,
            prompt,
            vec![Tool::WebSearch, Tool::FetchPage],
            SEARCH_RESULT_SCHEMA,
        )))
    }

    fn parse(&self, _ctx: &StageContext, session: &Session, reply: &str) -> Result<RefinementOutput> {
        let candidate = normalize_candidate(parse_reply(SEARCH_RESULT_SCHEMA, reply)?, session);
        Ok(RefinementOutput::Refined(candidate))
    }

    fn record(&self, session: &mut Session, output: &RefinementOutput) {
        if let RefinementOutput::Refined(candidate) = output {
            session.candidate = Some(candidate.clone());
        }
        session.refinement = Some(output.clone());
    }

    fn render(&self, output: &RefinementOutput) -> String {
        match output {
            RefinementOutput::PassThrough(verdict) => to_payload(verdict),
            RefinementOutput::Refined(candidate) => to_payload(candidate),
        }
    }
}
