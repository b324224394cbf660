use crate::traits::{PermissionGate, StopHandle, VendorError};
use agor_types::{PermissionVerdict, ProcessedEvent};
use anyhow::{Context, Result};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Gate verdict turned into a driver failure. The executor matches on this
/// to patch the task `failed` with the deny reason.
#[derive(Debug)]
pub struct PermissionDeniedError {
    pub tool_name: String,
    pub reason: String,
}

impl std::fmt::Display for PermissionDeniedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "permission denied for {}: {}", self.tool_name, self.reason)
    }
}

impl std::error::Error for PermissionDeniedError {}

/// Drive a JSONL-speaking vendor subprocess to completion.
///
/// One line of stdout is one vendor event; `decode` turns it into
/// `ProcessedEvent`s which are gated (for tool starts) and forwarded. The
/// stop handle is honored between lines — the child is killed, `Stopped` is
/// emitted and the call returns Ok. A non-zero exit without a stop becomes
/// a `VendorError::Sdk` carrying the buffered stderr.
pub async fn run_jsonl_stream(
    mut command: Command,
    mut decode: impl FnMut(&serde_json::Value) -> Vec<ProcessedEvent>,
    gate: Arc<dyn PermissionGate>,
    stop: StopHandle,
    events: mpsc::Sender<ProcessedEvent>,
) -> Result<()> {
    command
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let mut child = command.spawn().context("failed to spawn vendor SDK process")?;

    let stdout = child
        .stdout
        .take()
        .context("vendor process has no stdout")?;
    let stderr = child
        .stderr
        .take()
        .context("vendor process has no stderr")?;

    // Buffer stderr concurrently; it is only consulted on failure
    let stderr_task = tokio::spawn(async move {
        let mut buffer = String::new();
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(target: "vendor_stderr", "{}", line);
            buffer.push_str(&line);
            buffer.push('\n');
        }
        buffer
    });

    let mut lines = BufReader::new(stdout).lines();
    let mut interrupted = false;

    loop {
        let line = tokio::select! {
            biased;
            _ = stop.cancelled() => {
                interrupted = true;
                let _ = child.start_kill();
                break;
            }
            line = lines.next_line() => line?,
        };

        let Some(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }

        let raw: serde_json::Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => {
                warn!(line = %line, "unparseable vendor event dropped");
                continue;
            }
        };

        for event in decode(&raw) {
            if let ProcessedEvent::ToolStart {
                tool_name,
                tool_use_id,
                input,
            } = &event
            {
                match gate.check(tool_name, input, tool_use_id).await? {
                    PermissionVerdict::Allow => {}
                    PermissionVerdict::Deny { reason } => {
                        let _ = child.start_kill();
                        let _ = child.wait().await;
                        return Err(PermissionDeniedError {
                            tool_name: tool_name.clone(),
                            reason,
                        }
                        .into());
                    }
                }
            }
            if events.send(event).await.is_err() {
                // Receiver gone: the executor is shutting down
                let _ = child.start_kill();
                interrupted = true;
                break;
            }
        }
        if interrupted {
            break;
        }
        if stop.is_stopped() {
            interrupted = true;
            let _ = child.start_kill();
            break;
        }
    }

    let status = child.wait().await?;

    if interrupted || stop.is_stopped() {
        let _ = events.send(ProcessedEvent::Stopped).await;
        return Ok(());
    }

    if !status.success() {
        let stderr_buffer = stderr_task.await.unwrap_or_default();
        return Err(VendorError::Sdk {
            message: format!("vendor process exited with {}", status),
            stderr: stderr_buffer,
        }
        .into());
    }

    Ok(())
}
