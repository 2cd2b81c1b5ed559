//! Pipeline configuration merging.
//!
//! Applies case-specific overrides to the repository's pipeline configuration.

use anyhow::Result;
use civiclink::io::config::PipelineConfig;

use crate::case::CaseConfig;

/// Apply case configuration overrides to the base pipeline config.
pub fn apply_case_config(
    mut base: PipelineConfig,
    overrides: &CaseConfig,
) -> Result<PipelineConfig> {
    if let Some(max_iterations) = overrides.max_iterations {
        base.max_iterations = max_iterations;
    }
    if let Some(threshold) = overrides.approval_threshold {
        base.approval_threshold = threshold;
    }
    if let Some(days) = overrides.stale_after_days {
        base.stale_after_days = days;
    }
    base.validate()?;
    Ok(base)
}
