//! Per-query session state shared by the pipeline stages.

use uuid::Uuid;

use crate::core::types::{RefinementOutput, SearchResult, SynthesisResult, ValidationVerdict};
use crate::io::prompt::RejectedSource;
use crate::research_loop::LoopOutcome;

/// State for one in-flight query. Created before dispatch, discarded once the
/// answer is extracted.
///
/// Each stage writes its latest output to its own field; later stages read
/// those fields instead of receiving parameters.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: String,
    pub query: String,
    /// Output of the Search stage.
    pub search: Option<SearchResult>,
    /// Latest candidate awaiting validation, seeded by Search and replaced by Refinement.
    pub candidate: Option<SearchResult>,
    /// Latest Validation verdict.
    pub verdict: Option<ValidationVerdict>,
    /// Latest Refinement output.
    pub refinement: Option<RefinementOutput>,
    /// Sources rejected so far, oldest first.
    pub rejected: Vec<RejectedSource>,
    /// Final state of the research loop.
    pub research: Option<LoopOutcome>,
    pub synthesis: Option<SynthesisResult>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            query: query.into(),
            search: None,
            candidate: None,
            verdict: None,
            refinement: None,
            rejected: Vec::new(),
            research: None,
            synthesis: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sessions_get_distinct_ids() {
        let a = Session::new("user", "q");
        let b = Session::new("user", "q");
        assert_ne!(a.id, b.id);
        assert!(a.search.is_none() && a.research.is_none());
    }
}
