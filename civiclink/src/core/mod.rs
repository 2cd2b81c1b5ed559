//! Deterministic, pure logic shared by the civiclink pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod freshness;
pub mod loop_state;
pub mod progress;
pub mod reply;
pub mod trust;
pub mod types;
pub mod verdict;
