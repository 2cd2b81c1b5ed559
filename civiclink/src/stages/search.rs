use anyhow::Result;

use crate::core::reply::parse_reply;
use crate::core::types::{SearchResult, StageName};
use crate::io::backend::Tool;
use crate::session::Session;
use crate::stages::{SEARCH_RESULT_SCHEMA, Stage, StageContext, StagePlan, to_payload};

/// Finds a first candidate source for the query.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchStage;

impl Stage for SearchStage {
    type Output = SearchResult;

    const NAME: StageName = StageName::Search;

    fn plan(&self, ctx: &StageContext, session: &Session) -> Result<StagePlan<SearchResult>> {
        let prompt = ctx.prompts.build_search(&session.query)?;
        Ok(StagePlan::Invoke(ctx.request(
            Self::NAME,
            prompt,
            vec![Tool::WebSearch, Tool::FetchPage],
            SEARCH_RESULT_SCHEMA,
        )))
    }

    fn parse(&self, _ctx: &StageContext, session: &Session, reply: &str) -> Result<SearchResult> {
        Ok(normalize_candidate(parse_reply(SEARCH_RESULT_SCHEMA, reply)?, session))
    }

    fn record(&self, session: &mut Session, output: &SearchResult) {
        session.search = Some(output.clone());
        session.candidate = Some(output.clone());
    }

    fn render(&self, output: &SearchResult) -> String {
        to_payload(output)
    }
}

/// Keep the original query on the candidate and trim the chosen URL.
pub(crate) fn normalize_candidate(mut candidate: SearchResult, session: &Session) -> SearchResult {
    candidate.url = candidate.url.trim().to_string();
    if candidate.query.trim().is_empty() {
        candidate.query = session.query.clone();
    }
    candidate
}
