//! Helpers for child processes with bounded output capture.

use std::process::Stdio;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tracing::{debug, error};

/// Output captured from a pipe, bounded in size.
#[derive(Debug, Default)]
pub struct LimitedOutput {
    pub bytes: Vec<u8>,
    /// Bytes drained from the pipe but not kept.
    pub truncated: usize,
}

impl LimitedOutput {
    pub fn truncated_notice(&self, label: &str) -> String {
        if self.truncated > 0 {
            format!("\n[{label} truncated {} bytes]\n", self.truncated)
        } else {
            String::new()
        }
    }

    pub fn lossy(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// Spawn `cmd` with all three standard streams piped.
///
/// The child is killed if its handle is dropped before it exits.
pub fn spawn_piped(cmd: &mut Command) -> Result<Child> {
    cmd.stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    debug!("spawning child process");
    cmd.spawn().map_err(|err| {
        error!(err = %err, "failed to spawn command");
        anyhow!(err).context("spawn command")
    })
}

/// Write `input` to the child's stdin and close it.
pub async fn feed_stdin(child: &mut Child, input: &[u8]) -> Result<()> {
    let mut stdin = child
        .stdin
        .take()
        .ok_or_else(|| anyhow!("stdin was not piped"))?;
    stdin.write_all(input).await.context("write stdin")?;
    stdin.shutdown().await.context("close stdin")?;
    Ok(())
}

/// Read a stream to the end, keeping at most `limit` bytes.
///
/// Bytes past the limit are still drained so the child never blocks on a full pipe.
pub async fn read_stream_limited<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
) -> Result<LimitedOutput> {
    let mut out = LimitedOutput::default();
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).await.context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(out.bytes.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            out.bytes.extend_from_slice(&chunk[..keep]);
            out.truncated += n.saturating_sub(keep);
        } else {
            out.truncated += n;
        }
    }

    Ok(out)
}
