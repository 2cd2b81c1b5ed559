use civiclink::driver::DriverOutcome;
use serde::{Deserialize, Serialize};

use crate::judge::Judgment;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Fail,
    NoAnswer,
    Error,
}

pub fn classify_outcome(outcome: &DriverOutcome, judgment: &Judgment) -> Outcome {
    match outcome {
        DriverOutcome::Answered { .. } => {
            if judgment.all_passed() {
                Outcome::Success
            } else {
                Outcome::Fail
            }
        }
        DriverOutcome::NoAnswer => Outcome::NoAnswer,
        DriverOutcome::Failed { .. } => Outcome::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::CheckOutcome;

    fn judgment(pass: bool) -> Judgment {
        Judgment {
            checks: vec![CheckOutcome::Answered { passed: pass }],
        }
    }

    fn answered() -> DriverOutcome {
        DriverOutcome::Answered {
            markdown: "## Source URL\nx\n\n## Summary\ny".to_string(),
            source_url: "x".to_string(),
        }
    }

    #[test]
    fn success_when_answered_and_checks_pass() {
        assert_eq!(classify_outcome(&answered(), &judgment(true)), Outcome::Success);
    }

    #[test]
    fn fail_when_answered_but_checks_fail() {
        assert_eq!(classify_outcome(&answered(), &judgment(false)), Outcome::Fail);
    }

    #[test]
    fn no_answer_and_error_ignore_checks() {
        assert_eq!(
            classify_outcome(&DriverOutcome::NoAnswer, &judgment(true)),
            Outcome::NoAnswer
        );
        let failed = DriverOutcome::Failed {
            error: "boom".to_string(),
        };
        assert_eq!(classify_outcome(&failed, &judgment(true)), Outcome::Error);
    }
}
