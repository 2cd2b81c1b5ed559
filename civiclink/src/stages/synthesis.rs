use anyhow::{Context, Result};

use crate::core::reply::parse_reply;
use crate::core::types::{StageName, SynthesisResult};
use crate::io::prompt::SynthesisInputs;
use crate::session::Session;
use crate::stages::{SYNTHESIS_RESULT_SCHEMA, Stage, StageContext, StagePlan};

/// Summarizes the research loop's carried content as markdown.
#[derive(Debug, Clone, Copy, Default)]
pub struct SynthesisStage;

impl Stage for SynthesisStage {
    type Output = SynthesisResult;

    const NAME: StageName = StageName::Synthesis;

    fn plan(&self, ctx: &StageContext, session: &Session) -> Result<StagePlan<SynthesisResult>> {
        let research = session
            .research
            .as_ref()
            .context("research loop has not finished")?;
        let prompt = ctx.prompts.build_synthesis(&SynthesisInputs {
            query: &session.query,
            source_url: &research.source_url,
            content: &research.content,
            approved: research.approved,
        })?;
        Ok(StagePlan::Invoke(ctx.request(
            Self::NAME,
            prompt,
            Vec::new(),
            SYNTHESIS_RESULT_SCHEMA,
        )))
    }

    fn parse(&self, _ctx: &StageContext, session: &Session, reply: &str) -> Result<SynthesisResult> {
        let mut result: SynthesisResult = parse_reply(SYNTHESIS_RESULT_SCHEMA, reply)?;
        if result.source_url.trim().is_empty()
            && let Some(research) = &session.research
        {
            result.source_url = research.source_url.clone();
        }
        Ok(result)
    }

    fn record(&self, session: &mut Session, output: &SynthesisResult) {
        session.synthesis = Some(output.clone());
    }

    fn render(&self, output: &SynthesisResult) -> String {
        output.to_markdown()
    }
}
