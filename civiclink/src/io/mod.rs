//! I/O helpers for the civiclink pipeline.

pub mod backend;
pub mod codex;
pub mod config;
pub mod process;
pub mod prompt;
