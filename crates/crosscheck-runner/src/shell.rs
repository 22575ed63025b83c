//! Shell command execution with captured output.

use crosscheck_core::{Error, Result};
use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, timeout};
use tracing::{debug, info, warn};

/// Terminal state of an executed command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandStatus {
    Exited(i32),
    TimedOut,
    Cancelled,
}

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    pub status: CommandStatus,
    /// Captured output lines, stdout and stderr interleaved in arrival order.
    pub output: Vec<String>,
    pub duration_ms: u64,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        matches!(self.status, CommandStatus::Exited(0))
    }
}

/// Run a shell command in `workdir`, streaming output until the process
/// reaches a terminal state. The command is killed on timeout or when the
/// cancel signal flips.
pub async fn execute_command(
    command: &str,
    workdir: &Path,
    env: &HashMap<String, String>,
    step_timeout: Duration,
    cancel: &mut watch::Receiver<bool>,
) -> Result<CommandOutcome> {
    let start = std::time::Instant::now();

    info!(command = %command, workdir = %workdir.display(), "Executing shell command");

    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(workdir)
        .envs(env)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| Error::Internal(format!("Failed to spawn process: {}", e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| Error::Internal("child stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| Error::Internal("child stderr not captured".to_string()))?;

    let (tx, mut rx) = mpsc::channel::<String>(256);

    let stdout_tx = tx.clone();
    let stdout_handle = tokio::spawn(async move {
        let reader = BufReader::new(stdout);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(line = %line, "stdout");
            if stdout_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let stderr_tx = tx;
    let stderr_handle = tokio::spawn(async move {
        let reader = BufReader::new(stderr);
        let mut lines = reader.lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(line = %line, "stderr");
            if stderr_tx.send(line).await.is_err() {
                break;
            }
        }
    });

    let status = tokio::select! {
        wait_result = timeout(step_timeout, child.wait()) => match wait_result {
            Ok(result) => {
                let exit = result
                    .map_err(|e| Error::Internal(format!("Failed to wait for process: {}", e)))?;
                CommandStatus::Exited(exit.code().unwrap_or(-1))
            }
            Err(_) => {
                warn!(timeout_secs = step_timeout.as_secs(), "Command timed out, killing process");
                let _ = child.kill().await;
                CommandStatus::TimedOut
            }
        },
        _ = cancel_requested(cancel) => {
            info!("Cancellation requested, killing process");
            let _ = child.kill().await;
            CommandStatus::Cancelled
        }
    };

    let _ = stdout_handle.await;
    let _ = stderr_handle.await;

    let mut output = Vec::new();
    while let Some(line) = rx.recv().await {
        output.push(line);
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    debug!(?status, duration_ms, "Command completed");

    Ok(CommandOutcome {
        status,
        output,
        duration_ms,
    })
}

/// Resolves when cancellation is signalled; pends forever if the sender side
/// is gone (no cancellation can ever arrive).
async fn cancel_requested(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}
