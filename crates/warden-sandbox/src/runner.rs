//! Spawns validated commands with a fixed environment, a wall-clock timeout
//! and a cumulative stdout cap.

use crate::policy::RunLimits;
use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};
use warden_core::{CommandRunner, GuardError};

const FALLBACK_PATH: &str = "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin";
const NO_STDERR: &str = "(no stderr)";
const READ_CHUNK: usize = 8 * 1024;

/// Runs commands directly (no shell) inside the workspace root.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workspace: PathBuf,
    limits: RunLimits,
}

impl ProcessRunner {
    pub fn new(workspace: impl Into<PathBuf>, limits: RunLimits) -> Self {
        Self {
            workspace: workspace.into(),
            limits,
        }
    }

    pub fn limits(&self) -> RunLimits {
        self.limits
    }

    fn command(&self, command: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&self.workspace)
            .env_clear()
            .env(
                "PATH",
                std::env::var_os("PATH").unwrap_or_else(|| FALLBACK_PATH.into()),
            )
            .env(
                "HOME",
                std::env::var_os("HOME").unwrap_or_else(|| self.workspace.clone().into()),
            )
            .env("LANG", "C.UTF-8")
            .env("NO_COLOR", "1")
            .env("TERM", "dumb")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }
}

enum Collected {
    Complete(Vec<u8>),
    Overflow,
}

/// Read until EOF, giving up as soon as more than `limit` bytes arrive.
async fn read_stdout<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> io::Result<Collected> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(Collected::Complete(out));
        }
        if out.len() + n > limit {
            return Ok(Collected::Overflow);
        }
        out.extend_from_slice(&buf[..n]);
    }
}

/// Read until EOF, keeping at most `limit` bytes. The rest is drained so the
/// child never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(mut reader: R, limit: usize) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => return out,
            Ok(n) => {
                let room = limit.saturating_sub(out.len());
                out.extend_from_slice(&buf[..n.min(room)]);
            }
        }
    }
}

async fn terminate(child: &mut Child, command: &str) {
    if let Err(e) = child.kill().await {
        warn!(command, error = %e, "failed to kill child process");
    }
}

fn exit_error(status: ExitStatus, stderr: &[u8]) -> GuardError {
    let stderr = String::from_utf8_lossy(stderr).trim().to_owned();
    GuardError::NonZeroExit {
        // signal-terminated processes have no exit code
        code: status.code().unwrap_or(-1),
        stderr: if stderr.is_empty() {
            NO_STDERR.to_owned()
        } else {
            stderr
        },
    }
}

/// Stop a reader task whose output will never be used.
fn abandon<T>(task: Option<JoinHandle<T>>) {
    if let Some(task) = task {
        task.abort();
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    async fn run(&self, command: &str, args: &[String]) -> Result<String, GuardError> {
        let RunLimits {
            max_output_size,
            timeout,
        } = self.limits;
        debug!(
            command,
            argc = args.len(),
            workspace = %self.workspace.display(),
            max_output_size,
            timeout_ms = timeout.as_millis(),
            "exec starting"
        );

        let spawn_error = |source: io::Error| GuardError::Spawn {
            command: command.to_owned(),
            source,
        };
        let mut child = self.command(command, args).spawn().map_err(spawn_error)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| spawn_error(io::Error::other("stdout not captured")))?;
        let stderr_task = child
            .stderr
            .take()
            .map(|stderr| tokio::spawn(read_capped(stderr, max_output_size)));

        let deadline = Instant::now() + timeout;
        let stdout = match tokio::time::timeout_at(deadline, read_stdout(stdout, max_output_size))
            .await
        {
            Ok(Ok(Collected::Complete(bytes))) => bytes,
            Ok(Ok(Collected::Overflow)) => {
                terminate(&mut child, command).await;
                abandon(stderr_task);
                debug!(command, max_output_size, "output limit exceeded");
                return Err(GuardError::OutputLimit {
                    limit: max_output_size,
                });
            }
            Ok(Err(e)) => {
                terminate(&mut child, command).await;
                abandon(stderr_task);
                return Err(spawn_error(e));
            }
            Err(_elapsed) => {
                terminate(&mut child, command).await;
                abandon(stderr_task);
                debug!(command, "command timed out");
                return Err(GuardError::Timeout { timeout });
            }
        };

        let status = match tokio::time::timeout_at(deadline, child.wait()).await {
            Ok(Ok(status)) => status,
            Ok(Err(e)) => {
                abandon(stderr_task);
                return Err(spawn_error(e));
            }
            Err(_elapsed) => {
                terminate(&mut child, command).await;
                abandon(stderr_task);
                debug!(command, "command timed out after closing stdout");
                return Err(GuardError::Timeout { timeout });
            }
        };

        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        debug!(
            command,
            exit_code = status.code().unwrap_or(-1),
            stdout_len = stdout.len(),
            stderr_len = stderr.len(),
            "exec complete"
        );

        if status.success() {
            Ok(String::from_utf8_lossy(&stdout).into_owned())
        } else {
            Err(exit_error(status, &stderr))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn read_stdout_stops_past_limit() {
        let data = vec![b'y'; 64];
        assert!(matches!(
            read_stdout(&data[..], 63).await.expect("read"),
            Collected::Overflow
        ));
        assert!(matches!(
            read_stdout(&data[..], 64).await.expect("read"),
            Collected::Complete(bytes) if bytes.len() == 64
        ));
    }

    #[tokio::test]
    async fn abandon_drops_the_reader() {
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let _tx = tx;
            std::future::pending::<()>().await;
        });
        abandon(Some(task));
        assert!(rx.await.is_err());
        abandon::<()>(None);
    }

    #[tokio::test]
    async fn read_capped_keeps_prefix() {
        let data = b"0123456789".to_vec();
        assert_eq!(read_capped(&data[..], 4).await, b"0123");
        assert_eq!(read_capped(&data[..], 100).await, data);
    }

    #[cfg(unix)]
    #[test]
    fn exit_error_placeholder_and_signal_code() {
        use std::os::unix::process::ExitStatusExt;

        let err = exit_error(ExitStatus::from_raw(9), b"");
        assert!(
            matches!(err, GuardError::NonZeroExit { code: -1, ref stderr } if stderr == NO_STDERR)
        );

        let err = exit_error(ExitStatus::from_raw(3 << 8), b"boom\n");
        assert!(matches!(err, GuardError::NonZeroExit { code: 3, ref stderr } if stderr == "boom"));
    }
}
