//! Civic research pipeline.
//!
//! Given a civic or policy question, the pipeline searches the web for a
//! source, validates its credibility, refines the search when validation
//! fails, and summarizes the approved source as markdown. The architecture
//! keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (stage types, approval rule, trust
//!   tiers, loop state machine, progress labels). No I/O.
//! - **[`io`]**: Side-effecting operations (model backend, child processes,
//!   configuration, prompt rendering). Isolated to enable scripting in tests.
//!
//! Orchestration modules ([`stages`], [`research_loop`], [`pipeline`],
//! [`driver`]) compose the two into the fixed workflow
//! Search, then Validation/Refinement/Exit-Check until approval or the cap,
//! then Synthesis.

pub mod core;
pub mod driver;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod research_loop;
pub mod session;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
