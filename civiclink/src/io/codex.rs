//! Model backend that spawns `codex exec`.
//!
//! Each request runs in a fresh scratch directory holding the output schema and
//! the last-message file. The JSONL event log on stdout is scanned for tool
//! items, which are forwarded as [`ModelEvent::ToolCall`] while the run is live.

use std::path::Path;

use anyhow::{Context, anyhow};
use async_stream::try_stream;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::io::backend::{ModelBackend, ModelEvent, ModelRequest, ModelStream, Tool};
use crate::io::config::BackendConfig;
use crate::io::process::{feed_stdin, read_stream_limited, spawn_piped};

/// Backend that drives the Codex CLI in non-interactive mode.
#[derive(Debug, Clone)]
pub struct CodexBackend {
    config: BackendConfig,
}

impl CodexBackend {
    pub fn new(config: BackendConfig) -> Self {
        Self { config }
    }

    fn command(
        &self,
        request: &ModelRequest,
        workdir: &Path,
        schema_path: &Path,
        output_path: &Path,
    ) -> Command {
        let mut cmd = Command::new(&self.config.program);
        cmd.arg("exec")
            .arg("--json")
            // Scratch directories are never git repositories.
            .arg("--skip-git-repo-check")
            .arg("--sandbox")
            .arg(&self.config.sandbox)
            .arg("-c")
            .arg(format!(
                "model_reasoning_effort={}",
                request.settings.reasoning_effort.as_str()
            ));
        if let Some(model) = &request.settings.model {
            cmd.arg("--model").arg(model);
        }
        for tool in &request.tools {
            let key = match tool {
                Tool::WebSearch => "tools.web_search=true",
                Tool::FetchPage => "sandbox_workspace_write.network_access=true",
            };
            cmd.arg("-c").arg(key);
        }
        cmd.arg("--output-schema")
            .arg(schema_path)
            .arg("--output-last-message")
            .arg(output_path)
            .arg("-")
            .current_dir(workdir);
        cmd
    }
}

impl ModelBackend for CodexBackend {
    fn invoke(&self, request: ModelRequest) -> ModelStream<'_> {
        Box::pin(try_stream! {
            let stage = request.stage;
            info!(%stage, tools = request.tools.len(), "starting codex exec");

            let scratch = tempfile::tempdir().context("create codex scratch dir")?;
            let schema_path = scratch.path().join("output.schema.json");
            let output_path = scratch.path().join("last_message.json");
            tokio::fs::write(&schema_path, request.output_schema)
                .await
                .with_context(|| format!("write output schema {}", schema_path.display()))?;

            let mut cmd = self.command(&request, scratch.path(), &schema_path, &output_path);
            let mut child = spawn_piped(&mut cmd).context("run codex exec")?;
            feed_stdin(&mut child, request.prompt.as_bytes()).await?;

            let stdout = child
                .stdout
                .take()
                .ok_or_else(|| anyhow!("stdout was not piped"))?;
            let stderr = child
                .stderr
                .take()
                .ok_or_else(|| anyhow!("stderr was not piped"))?;
            let stderr_task = tokio::spawn(read_stream_limited(stderr, self.config.output_limit_bytes));

            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await.context("read codex event stream")? {
                if let Some(name) = parse_stream_line(&line) {
                    debug!(%stage, tool = %name, "codex tool call");
                    yield ModelEvent::ToolCall { name };
                }
            }

            let status = child.wait().await.context("wait for codex exec")?;
            let stderr = stderr_task.await.context("join stderr reader")??;
            if !status.success() {
                warn!(%stage, exit_code = ?status.code(), "codex exec failed");
                Err::<(), _>(anyhow!(
                    "codex exec failed with status {:?}: {}{}",
                    status.code(),
                    stderr.lossy().trim(),
                    stderr.truncated_notice("stderr")
                ))?;
            }

            let reply = tokio::fs::read_to_string(&output_path)
                .await
                .with_context(|| format!("read codex output {}", output_path.display()))?;
            debug!(%stage, reply_bytes = reply.len(), "codex exec completed");
            yield ModelEvent::Reply(reply);
        })
    }
}

/// Extract a tool name from one line of the `codex exec --json` event log.
///
/// Only completed tool items count, so each invocation is reported once.
pub fn parse_stream_line(line: &str) -> Option<String> {
    let value: Value = serde_json::from_str(line.trim()).ok()?;
    let kind = value.get("type")?.as_str()?;
    if kind == "error" || kind == "turn.failed" {
        warn!(event = %line.trim(), "codex reported an error");
        return None;
    }
    if kind != "item.completed" {
        return None;
    }
    let item = value.get("item")?;
    match item.get("type")?.as_str()? {
        "web_search" => Some(Tool::WebSearch.as_str().to_string()),
        "command_execution" => Some("shell".to_string()),
        "mcp_tool_call" => {
            let tool = item.get("tool").and_then(Value::as_str).unwrap_or("tool");
            match item.get("server").and_then(Value::as_str) {
                Some(server) => Some(format!("{server}.{tool}")),
                None => Some(tool.to_string()),
            }
        }
        _ => None,
    }
}
