//! Case execution orchestration.
//!
//! Runs the pipeline for a case, then captures results and applies checks.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use civiclink::driver::run_query;
use civiclink::io::backend::ModelBackend;
use civiclink::io::config::PipelineConfig;
use civiclink::pipeline::Pipeline;
use tracing::{debug, info, instrument};

use crate::case::CaseFile;
use crate::config::apply_case_config;
use crate::judge::{run_checks, write_judgment};
use crate::outcome::{Outcome, classify_outcome};
use crate::results::{CaptureInput, capture_results, update_outcome};

/// Result of running a single case.
#[derive(Debug)]
pub struct RunOutcome {
    /// Unique identifier for this eval run.
    pub eval_run_id: String,
    /// Path to the results directory.
    pub results_dir: PathBuf,
    /// Classified outcome.
    pub outcome: Outcome,
}

pub fn eval_run_id(run_num: u32) -> String {
    format!("eval-{}-{run_num}", Utc::now().format("%Y%m%d_%H%M%S"))
}

/// Run a case end-to-end: pipeline run, result capture, checks.
#[instrument(skip_all, fields(case_id = %case.case.id, run_num = run_num))]
pub async fn run_case<B: ModelBackend>(
    repo_root: &Path,
    case_path: &Path,
    case: &CaseFile,
    base: PipelineConfig,
    backend: B,
    run_num: u32,
) -> Result<RunOutcome> {
    info!("case run started");

    let config = apply_case_config(base, &case.config).context("apply case config")?;
    let pipeline = Pipeline::new(backend, &config);

    let started_at = Utc::now();
    let eval_run_id = eval_run_id(run_num);

    let mut progress = Vec::new();
    let driver_outcome = run_query(&pipeline, &case.case.user_id, &case.case.query, |update| {
        debug!(update = %update, "progress");
        progress.push(update.text().to_string());
    })
    .await;
    let finished_at = Utc::now();

    let duration = finished_at - started_at;
    info!(
        answered = driver_outcome.is_answered(),
        duration_secs = duration.num_milliseconds() as f64 / 1000.0,
        "pipeline finished"
    );

    debug!("capturing results");
    let capture_input = CaptureInput {
        case_id: &case.case.id,
        case_path,
        eval_run_id: &eval_run_id,
        query: &case.case.query,
        user_id: &case.case.user_id,
        outcome: &driver_outcome,
        progress: &progress,
        started_at,
        finished_at,
        repo_root,
    };
    let results_dir = capture_results(&repo_root.join("eval").join("results"), &capture_input)
        .context("capture results")?;

    debug!("running checks");
    let judgment = run_checks(&case.checks, &driver_outcome);
    write_judgment(&results_dir.join("checks.json"), &judgment).context("write checks")?;

    let outcome = classify_outcome(&driver_outcome, &judgment);
    update_outcome(&results_dir, outcome).context("update outcome")?;

    info!(outcome = ?outcome, results_dir = %results_dir.display(), "case run complete");

    Ok(RunOutcome {
        eval_run_id,
        results_dir,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use civiclink::core::types::StageName;
    use civiclink::test_support::{
        ScriptedBackend, ScriptedReply, search_reply, synthesis_reply, verdict_reply,
    };
    use tempfile::tempdir;

    use super::*;

    const CASE: &str = r#"
[case]
id = "street-tree"
query = "Can I plant a tree on the sidewalk strip in County X?"

[[checks]]
type = "answered"

[[checks]]
type = "answer_contains"
text = "permit"

[[checks]]
type = "has_sections"

[[checks]]
type = "source_url_contains"
text = ".gov"
"#;

    #[test]
    fn eval_run_id_format() {
        let id = eval_run_id(3);
        assert!(id.starts_with("eval-"));
        assert!(id.ends_with("-3"));
    }

    #[tokio::test]
    async fn scripted_run_is_captured_and_judged() {
        let temp = tempdir().expect("tempdir");
        let case_path = temp.path().join("street-tree.toml");
        fs::write(&case_path, CASE).expect("write case");
        let case = CaseFile::load(&case_path).expect("case");

        let url = "https://countyx.gov/trees";
        let backend = ScriptedBackend::new()
            .with(
                StageName::Search,
                ScriptedReply::ok(search_reply(&case.case.query, url, "A permit is required.")),
            )
            .with(
                StageName::Validation,
                ScriptedReply::ok(verdict_reply("Official county page.", 0.97, true, true)),
            )
            .with(
                StageName::Synthesis,
                ScriptedReply::ok(synthesis_reply(url, "Apply for a street tree permit first.")),
            );

        let run = run_case(
            temp.path(),
            &case_path,
            &case,
            PipelineConfig::default(),
            backend,
            1,
        )
        .await
        .expect("run case");

        assert_eq!(run.outcome, Outcome::Success);
        for file in ["meta.json", "answer.md", "progress.log", "checks.json"] {
            assert!(run.results_dir.join(file).exists(), "missing {file}");
        }
        let progress = fs::read_to_string(run.results_dir.join("progress.log")).expect("log");
        assert!(progress.starts_with("Searching the web for a source..."));
    }

    #[tokio::test]
    async fn failed_run_is_classified_as_error() {
        let temp = tempdir().expect("tempdir");
        let case_path = temp.path().join("street-tree.toml");
        fs::write(&case_path, CASE).expect("write case");
        let case = CaseFile::load(&case_path).expect("case");
        let backend =
            ScriptedBackend::new().with(StageName::Search, ScriptedReply::failure("offline"));

        let run = run_case(
            temp.path(),
            &case_path,
            &case,
            PipelineConfig::default(),
            backend,
            1,
        )
        .await
        .expect("run case");

        assert_eq!(run.outcome, Outcome::Error);
    }
}
