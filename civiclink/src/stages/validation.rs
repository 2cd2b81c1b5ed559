use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info};

use crate::core::freshness;
use crate::core::reply::parse_reply;
use crate::core::trust::classify_url;
use crate::core::types::{SearchResult, StageName, ValidationVerdict};
use crate::core::verdict::{VerdictReply, approval_blocker, settle_verdict};
use crate::io::prompt::{RejectedSource, ValidationInputs};
use crate::session::Session;
use crate::stages::{Stage, StageContext, StagePlan, VALIDATION_VERDICT_SCHEMA, to_payload};

/// Scores the latest candidate's credibility and relevance.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationStage;

fn candidate(session: &Session) -> Result<&SearchResult> {
    session
        .candidate
        .as_ref()
        .context("no candidate source to validate")
}

impl Stage for ValidationStage {
    type Output = ValidationVerdict;

    const NAME: StageName = StageName::Validation;

    fn plan(&self, ctx: &StageContext, session: &Session) -> Result<StagePlan<ValidationVerdict>> {
        let candidate = candidate(session)?;
        if !candidate.has_content() {
            debug!(url = %candidate.url, "candidate has no content, rejecting without the model");
            return Ok(StagePlan::Settled {
                output: ValidationVerdict::rejected(
                    "The candidate source has no content to validate.",
                    0.0,
                ),
                tool_calls: Vec::new(),
            });
        }

        let source = classify_url(&candidate.url);
        let freshness = freshness::assess(
            &session.query,
            &candidate.timestamp,
            Utc::now().date_naive(),
            ctx.stale_after_days,
        );
        let prompt = ctx.prompts.build_validation(&ValidationInputs {
            query: &session.query,
            candidate,
            source: &source,
            freshness,
            threshold: ctx.policy.threshold,
        })?;
        Ok(StagePlan::Invoke(ctx.request(
            Self::NAME,
            prompt,
            Vec::new(),
            VALIDATION_VERDICT_SCHEMA,
        )))
    }

    fn parse(&self, ctx: &StageContext, session: &Session, reply: &str) -> Result<ValidationVerdict> {
        let candidate = candidate(session)?;
        let reply: VerdictReply = parse_reply(VALIDATION_VERDICT_SCHEMA, reply)?;
        let tier = classify_url(&candidate.url).tier;
        if let Some(blocker) = approval_blocker(&reply, candidate, tier, &ctx.policy) {
            debug!(
                url = %candidate.url,
                tier = tier.as_str(),
                confidence = reply.confidence_score,
                reason = blocker.as_str(),
                "source not approved"
            );
        }
        let verdict = settle_verdict(reply, candidate, tier, &ctx.policy);
        info!(
            url = %candidate.url,
            approved = verdict.approved,
            confidence = verdict.confidence_score,
            "validated source"
        );
        Ok(verdict)
    }

    fn record(&self, session: &mut Session, output: &ValidationVerdict) {
        if !output.approved
            && let Some(candidate) = &session.candidate
            && !candidate.url.is_empty()
        {
            session.rejected.push(RejectedSource {
                url: candidate.url.clone(),
                analysis: output.analysis.clone(),
            });
        }
        session.verdict = Some(output.clone());
    }

    fn render(&self, output: &ValidationVerdict) -> String {
        to_payload(output)
    }
}
