//! Hook command launcher
//!
//! Starts a resolved hook command with the raw delivery on its standard input
//! and hands the child to a detached reaper task. The caller only learns
//! whether the process started; exit status, signals and timeouts end up in
//! the log.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use axum::body::Bytes;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

use crate::services::resolver::is_regular_file;

#[cfg(unix)]
use std::os::unix::process::ExitStatusExt;

/// Default wall-clock limit for a hook command
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Reasons a hook command did not start
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("command not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to start {}: {source}", .path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Spawns hook commands with a wall-clock timeout
#[derive(Debug, Clone)]
pub struct ProcessLauncher {
    timeout: Duration,
}

impl Default for ProcessLauncher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }
}

impl ProcessLauncher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start `path` with `payload` as its entire standard input.
    ///
    /// The returned handle belongs to the reaper task; dropping it leaves the
    /// reaper running.
    pub async fn launch(&self, path: &Path, payload: Bytes) -> Result<JoinHandle<()>, LaunchError> {
        // Resolution and spawn are not atomic, so look again right before exec
        if !is_regular_file(path).await {
            return Err(LaunchError::NotFound(path.to_path_buf()));
        }

        info!(command = %path.display(), "Starting hook command");

        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| {
                error!(command = %path.display(), error = %source, "Failed to start hook command");
                LaunchError::Spawn {
                    path: path.to_path_buf(),
                    source,
                }
            })?;

        info!(
            command = %path.display(),
            pid = child.id(),
            "Hook command executing"
        );

        let stdin = child.stdin.take();
        let reaper = reap(child, stdin, payload, path.to_path_buf(), self.timeout);

        Ok(tokio::spawn(reaper))
    }
}

/// Feed stdin, wait for exit, and kill the child once `limit` has elapsed.
async fn reap(
    mut child: Child,
    stdin: Option<ChildStdin>,
    payload: Bytes,
    path: PathBuf,
    limit: Duration,
) {
    let started = Instant::now();
    let feed_path = path.clone();

    let feed = async move {
        let Some(mut stdin) = stdin else {
            return;
        };
        if let Err(e) = stdin.write_all(&payload).await {
            // A command is free to ignore its input and exit early
            if e.kind() != ErrorKind::BrokenPipe {
                warn!(
                    command = %feed_path.display(),
                    error = %e,
                    "Failed to write payload to hook command"
                );
            }
        }
        // stdin is dropped here, which closes the pipe
    };

    let result = timeout(limit, async {
        let ((), status) = tokio::join!(feed, child.wait());
        status
    })
    .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;

    match result {
        Ok(Ok(status)) => log_exit(&path, status, elapsed_ms),
        Ok(Err(e)) => {
            error!(command = %path.display(), error = %e, "Failed to wait for hook command");
        }
        Err(_) => {
            warn!(
                command = %path.display(),
                timeout_secs = limit.as_secs_f64(),
                "Hook command timed out, killing it"
            );
            match child.kill().await {
                Ok(()) => info!(command = %path.display(), "Hook command killed"),
                Err(e) => {
                    error!(command = %path.display(), error = %e, "Failed to kill hook command")
                }
            }
        }
    }
}

fn log_exit(path: &Path, status: ExitStatus, elapsed_ms: u64) {
    #[cfg(unix)]
    let signal = status.signal();
    #[cfg(not(unix))]
    let signal: Option<i32> = None;

    if status.success() {
        info!(command = %path.display(), elapsed_ms, "Hook command completed");
    } else {
        warn!(
            command = %path.display(),
            exit_code = ?status.code(),
            signal = ?signal,
            elapsed_ms,
            "Hook command completed with failure"
        );
    }
}
