//! Pipeline configuration stored in `civiclink.toml`.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::freshness::DEFAULT_STALE_AFTER_DAYS;
use crate::core::loop_state::DEFAULT_MAX_ITERATIONS;
use crate::core::types::StageName;
use crate::core::verdict::DEFAULT_APPROVAL_THRESHOLD;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "civiclink.toml";

/// Pipeline configuration (TOML).
///
/// This file is intended to be edited by humans. Missing fields default to the
/// values the workflow was tuned with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// Maximum Validation, Refinement and Exit-Check passes.
    pub max_iterations: u32,

    /// Minimum confidence score required to approve a source.
    pub approval_threshold: f64,

    /// Sources older than this are flagged for current-state queries.
    pub stale_after_days: i64,

    /// Byte budget for each rendered stage prompt.
    pub prompt_budget_bytes: usize,

    pub backend: BackendConfig,

    pub stages: StageSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            approval_threshold: DEFAULT_APPROVAL_THRESHOLD,
            stale_after_days: DEFAULT_STALE_AFTER_DAYS,
            prompt_budget_bytes: 60_000,
            backend: BackendConfig::default(),
            stages: StageSettings::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    /// Codex CLI executable.
    pub program: String,

    /// Value passed to `--sandbox`.
    pub sandbox: String,

    /// Keep at most this many bytes of backend stderr for error reports.
    pub output_limit_bytes: usize,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            program: "codex".to_string(),
            sandbox: "workspace-write".to_string(),
            output_limit_bytes: 100_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReasoningEffort {
    Minimal,
    #[default]
    Low,
    Medium,
    High,
}

impl ReasoningEffort {
    pub fn as_str(self) -> &'static str {
        match self {
            ReasoningEffort::Minimal => "minimal",
            ReasoningEffort::Low => "low",
            ReasoningEffort::Medium => "medium",
            ReasoningEffort::High => "high",
        }
    }
}

/// Model selection for one stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ModelSettings {
    /// Model name; the backend default when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub reasoning_effort: ReasoningEffort,
}

/// Per-stage model settings. Exit-Check never calls a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StageSettings {
    pub search: ModelSettings,
    pub validation: ModelSettings,
    pub refinement: ModelSettings,
    pub synthesis: ModelSettings,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            search: ModelSettings {
                model: None,
                reasoning_effort: ReasoningEffort::Medium,
            },
            validation: ModelSettings::default(),
            refinement: ModelSettings::default(),
            synthesis: ModelSettings::default(),
        }
    }
}

impl StageSettings {
    pub fn for_stage(&self, stage: StageName) -> Option<&ModelSettings> {
        match stage {
            StageName::Search => Some(&self.search),
            StageName::Validation => Some(&self.validation),
            StageName::Refinement => Some(&self.refinement),
            StageName::Synthesis => Some(&self.synthesis),
            StageName::ExitCheck => None,
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(anyhow!("max_iterations must be > 0"));
        }
        if !(self.approval_threshold > 0.0 && self.approval_threshold <= 1.0) {
            return Err(anyhow!("approval_threshold must be in (0, 1]"));
        }
        if self.stale_after_days <= 0 {
            return Err(anyhow!("stale_after_days must be > 0"));
        }
        if self.prompt_budget_bytes == 0 {
            return Err(anyhow!("prompt_budget_bytes must be > 0"));
        }
        if self.backend.program.trim().is_empty() {
            return Err(anyhow!("backend.program must be non-empty"));
        }
        if self.backend.output_limit_bytes == 0 {
            return Err(anyhow!("backend.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `PipelineConfig::default()`.
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    if !path.exists() {
        let cfg = PipelineConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: PipelineConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &PipelineConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create directory {}", parent.display()))?;
    }
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
