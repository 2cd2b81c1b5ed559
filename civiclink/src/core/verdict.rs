//! Approval rule applied to the Validation stage's model reply.
//!
//! The model proposes a verdict; this module decides it. Content is always
//! copied from the candidate under review, never taken from the model, so an
//! approved verdict carries exactly the text that was validated.

use serde::{Deserialize, Serialize};

use crate::core::trust::TrustTier;
use crate::core::types::{SearchResult, ValidationVerdict};

/// Default minimum confidence required for approval.
pub const DEFAULT_APPROVAL_THRESHOLD: f64 = 0.95;

/// Structured reply requested from the validation model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerdictReply {
    pub analysis: String,
    pub confidence_score: f64,
    /// Whether the content directly answers the query.
    pub relevant: bool,
    pub approved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ApprovalPolicy {
    pub threshold: f64,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_APPROVAL_THRESHOLD,
        }
    }
}

/// First reason a verdict cannot be approved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApprovalBlocker {
    ModelRejected,
    NotRelevant,
    LowConfidence,
    NoContent,
    UnacceptableSource,
}

impl ApprovalBlocker {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalBlocker::ModelRejected => "model rejected the source",
            ApprovalBlocker::NotRelevant => "content does not answer the query",
            ApprovalBlocker::LowConfidence => "confidence below threshold",
            ApprovalBlocker::NoContent => "candidate has no content",
            ApprovalBlocker::UnacceptableSource => "source tier is not acceptable",
        }
    }
}

/// Return the first rule the reply fails, or `None` when it may be approved.
pub fn approval_blocker(
    reply: &VerdictReply,
    candidate: &SearchResult,
    tier: TrustTier,
    policy: &ApprovalPolicy,
) -> Option<ApprovalBlocker> {
    if !candidate.has_content() {
        return Some(ApprovalBlocker::NoContent);
    }
    if tier.is_unacceptable() {
        return Some(ApprovalBlocker::UnacceptableSource);
    }
    if !reply.relevant {
        return Some(ApprovalBlocker::NotRelevant);
    }
    if clamp_confidence(reply.confidence_score) < policy.threshold {
        return Some(ApprovalBlocker::LowConfidence);
    }
    if !reply.approved {
        return Some(ApprovalBlocker::ModelRejected);
    }
    None
}

/// Turn a model reply into a verdict that satisfies the content invariant.
pub fn settle_verdict(
    reply: VerdictReply,
    candidate: &SearchResult,
    tier: TrustTier,
    policy: &ApprovalPolicy,
) -> ValidationVerdict {
    let approved = approval_blocker(&reply, candidate, tier, policy).is_none();
    ValidationVerdict {
        analysis: reply.analysis.trim().to_string(),
        confidence_score: clamp_confidence(reply.confidence_score),
        approved,
        raw_content: if approved {
            candidate.raw_content.clone()
        } else {
            String::new()
        },
    }
}

fn clamp_confidence(score: f64) -> f64 {
    if score.is_nan() {
        return 0.0;
    }
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reply::parse_reply;
    use crate::core::trust::classify_url;

    fn candidate(content: &str) -> SearchResult {
        SearchResult {
            url: "https://countyx.gov/trees".to_string(),
            raw_content: content.to_string(),
            ..SearchResult::default()
        }
    }

    fn reply(confidence: f64, relevant: bool, approved: bool) -> VerdictReply {
        VerdictReply {
            analysis: " Official county page. ".to_string(),
            confidence_score: confidence,
            relevant,
            approved,
        }
    }

    #[test]
    fn approval_copies_candidate_content() {
        let verdict = settle_verdict(
            reply(0.97, true, true),
            &candidate("Trees under 20ft need no permit."),
            TrustTier::Official,
            &ApprovalPolicy::default(),
        );
        assert!(verdict.approved);
        assert_eq!(verdict.raw_content, "Trees under 20ft need no permit.");
        assert_eq!(verdict.analysis, "Official county page.");
    }

    #[test]
    fn confidence_below_threshold_rejects_even_when_model_approves() {
        let verdict = settle_verdict(
            reply(0.94, true, true),
            &candidate("text"),
            TrustTier::Official,
            &ApprovalPolicy::default(),
        );
        assert!(!verdict.approved);
        assert!(verdict.raw_content.is_empty());
    }

    #[test]
    fn irrelevant_content_rejects_regardless_of_tier() {
        let blocker = approval_blocker(
            &reply(0.99, false, true),
            &candidate("text"),
            TrustTier::Official,
            &ApprovalPolicy::default(),
        );
        assert_eq!(blocker, Some(ApprovalBlocker::NotRelevant));
    }

    #[test]
    fn personal_sources_are_never_approved() {
        let blocker = approval_blocker(
            &reply(0.99, true, true),
            &candidate("text"),
            TrustTier::Personal,
            &ApprovalPolicy::default(),
        );
        assert_eq!(blocker, Some(ApprovalBlocker::UnacceptableSource));
    }

    #[test]
    fn blog_under_gov_subdomain_is_rejected() {
        let url = "https://gov.wordpress.com/2019/plant-anything";
        let candidate = SearchResult {
            url: url.to_string(),
            raw_content: "Plant anything you like on the strip.".to_string(),
            ..SearchResult::default()
        };
        let tier = classify_url(url).tier;
        assert_eq!(tier, TrustTier::Personal);

        let verdict = settle_verdict(
            reply(0.97, true, true),
            &candidate,
            tier,
            &ApprovalPolicy::default(),
        );
        assert!(!verdict.approved);
        assert!(verdict.raw_content.is_empty());
    }

    #[test]
    fn out_of_range_confidence_parses_and_is_clamped() {
        let parsed: VerdictReply = parse_reply(
            include_str!("../../schemas/validation_verdict.schema.json"),
            r#"{"analysis":"Official county page.","confidence_score":1.02,"relevant":true,"approved":true}"#,
        )
        .expect("reply parses");
        let verdict = settle_verdict(
            parsed,
            &candidate("Permits are required."),
            TrustTier::Official,
            &ApprovalPolicy::default(),
        );
        assert!(verdict.approved);
        assert_eq!(verdict.confidence_score, 1.0);
    }

    #[test]
    fn empty_candidate_cannot_be_approved() {
        let verdict = settle_verdict(
            reply(1.0, true, true),
            &candidate("   "),
            TrustTier::Official,
            &ApprovalPolicy::default(),
        );
        assert!(!verdict.approved);
        assert!(verdict.is_consistent());
    }

    #[test]
    fn every_settled_verdict_keeps_the_content_invariant() {
        let tiers = [TrustTier::Official, TrustTier::News, TrustTier::Personal];
        for tier in tiers {
            for confidence in [0.0, 0.5, 0.95, 1.5, f64::NAN] {
                for relevant in [true, false] {
                    for approved in [true, false] {
                        let verdict = settle_verdict(
                            reply(confidence, relevant, approved),
                            &candidate("content"),
                            tier,
                            &ApprovalPolicy::default(),
                        );
                        assert!(verdict.is_consistent(), "{verdict:?}");
                        assert!((0.0..=1.0).contains(&verdict.confidence_score));
                    }
                }
            }
        }
    }
}
