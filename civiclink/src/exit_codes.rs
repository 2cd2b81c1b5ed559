//! Stable exit codes for civiclink CLI commands.

/// Command succeeded; `ask` produced an answer.
pub const OK: i32 = 0;
/// Command failed due to invalid config or arguments.
pub const INVALID: i32 = 1;
/// `civiclink ask` finished without a final answer.
pub const NO_ANSWER: i32 = 2;
/// `civiclink ask` failed while running the workflow.
pub const FAILED: i32 = 3;
