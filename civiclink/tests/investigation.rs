//! Investigation tests for external CLI behavior.
//!
//! These tests exercise the real Codex CLI and are excluded from regular CI
//! runs because they require the CLI, network access and API credentials.
//!
//! Run with: `cargo test --test investigation -- --ignored`

#[path = "investigation/codex_backend.rs"]
mod codex_backend;
