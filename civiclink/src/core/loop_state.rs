//! State machine of the research loop.
//!
//! `Running(i)` for `i` in `1..=cap`, then one of the two exit states. Transitions
//! are driven solely by the Exit-Check decision at the end of each pass.

use crate::core::types::ExitDecision;

/// Default number of Validation, Refinement and Exit-Check passes.
pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    Running(u32),
    /// Exit-Check saw approved content during this pass.
    ExitedApproved { iteration: u32 },
    /// The cap was reached without approval.
    ExitedCapped { iteration: u32 },
}

impl LoopPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            LoopPhase::Running(_) => "RUNNING",
            LoopPhase::ExitedApproved { .. } => "EXITED_APPROVED",
            LoopPhase::ExitedCapped { .. } => "EXITED_CAPPED",
        }
    }

    /// Current pass number, or the pass the loop exited on.
    pub fn iteration(self) -> u32 {
        match self {
            LoopPhase::Running(i)
            | LoopPhase::ExitedApproved { iteration: i }
            | LoopPhase::ExitedCapped { iteration: i } => i,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopState {
    phase: LoopPhase,
    cap: u32,
}

impl LoopState {
    /// Enter `Running(1)`. A cap of zero is treated as one pass.
    pub fn new(cap: u32) -> Self {
        Self {
            phase: LoopPhase::Running(1),
            cap: cap.max(1),
        }
    }

    pub fn phase(&self) -> LoopPhase {
        self.phase
    }

    pub fn cap(&self) -> u32 {
        self.cap
    }

    pub fn is_running(&self) -> bool {
        matches!(self.phase, LoopPhase::Running(_))
    }

    pub fn iteration(&self) -> u32 {
        self.phase.iteration()
    }

    /// Apply the Exit-Check decision that closed the current pass.
    ///
    /// Exited states are terminal: further decisions leave them unchanged.
    pub fn advance(&mut self, decision: &ExitDecision) -> LoopPhase {
        if let LoopPhase::Running(i) = self.phase {
            self.phase = match decision {
                ExitDecision::Terminate(_) => LoopPhase::ExitedApproved { iteration: i },
                ExitDecision::Continue if i >= self.cap => LoopPhase::ExitedCapped { iteration: i },
                ExitDecision::Continue => LoopPhase::Running(i + 1),
            };
        }
        self.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::ValidationVerdict;

    fn terminate() -> ExitDecision {
        ExitDecision::Terminate(ValidationVerdict {
            analysis: "ok".to_string(),
            confidence_score: 0.97,
            approved: true,
            raw_content: "content".to_string(),
        })
    }

    #[test]
    fn starts_running_first_pass() {
        let state = LoopState::new(DEFAULT_MAX_ITERATIONS);
        assert_eq!(state.phase(), LoopPhase::Running(1));
        assert!(state.is_running());
    }

    #[test]
    fn terminate_exits_approved_mid_cap() {
        let mut state = LoopState::new(5);
        assert_eq!(state.advance(&ExitDecision::Continue), LoopPhase::Running(2));
        assert_eq!(
            state.advance(&terminate()),
            LoopPhase::ExitedApproved { iteration: 2 }
        );
    }

    #[test]
    fn continue_at_cap_exits_capped() {
        let mut state = LoopState::new(5);
        let mut passes = 0;
        while state.is_running() {
            passes += 1;
            state.advance(&ExitDecision::Continue);
        }
        assert_eq!(passes, 5);
        assert_eq!(state.phase(), LoopPhase::ExitedCapped { iteration: 5 });
    }

    #[test]
    fn exited_states_are_terminal() {
        let mut state = LoopState::new(1);
        state.advance(&ExitDecision::Continue);
        assert_eq!(state.advance(&terminate()), LoopPhase::ExitedCapped { iteration: 1 });
    }

    #[test]
    fn zero_cap_still_runs_one_pass() {
        let mut state = LoopState::new(0);
        assert_eq!(state.cap(), 1);
        assert_eq!(
            state.advance(&ExitDecision::Continue),
            LoopPhase::ExitedCapped { iteration: 1 }
        );
    }
}
