//! Development-time tracing for debugging the pipeline.
//!
//! # Separation of Concerns
//!
//! - **Tracing (this module)**: Dev diagnostics via `RUST_LOG`, output to stderr.
//!   Not part of the product output.
//!
//! - **Progress updates (`core/progress`)**: Labels shown to the user while a
//!   query runs. Always reported, unaffected by `RUST_LOG`.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing for a binary in this workspace.
///
/// Reads `RUST_LOG`; when unset, `default_filter` applies (`warn` for the CLI,
/// crate-level `info` for the UI server and eval harness). Output goes to
/// stderr in compact format so stdout stays reserved for answers.
///
/// # Example
/// ```bash
/// RUST_LOG=civiclink=debug cargo run -- ask "Can I burn leaves in County X?"
/// ```
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    if let Err(err) = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .try_init()
    {
        // The subscriber installed first keeps running and receives this.
        tracing::debug!(error = %err, "tracing already initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_does_not_panic() {
        init("warn");
        init("civiclink=debug");
        tracing::warn!("still logging after a repeated init");
    }
}
