use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

/// Exit status reported when a subprocess is killed on timeout, matching the
/// convention of the coreutils `timeout` binary.
pub const TIMEOUT_EXIT_STATUS: i32 = 124;

/// Outcome of one subprocess invocation.
///
/// Non-zero exit, timeout, and spawn failure are all reported through this
/// struct; `run_command` itself never fails.
#[derive(Debug, Clone, Serialize)]
pub struct CommandResult {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// Spawn failure marker: the program never ran at all.
    ///
    /// Handlers that want to fall back to another program (rg → grep) check
    /// this rather than guessing from exit codes.
    pub fn is_spawn_failure(&self) -> bool {
        self.status == 1 && self.stderr.starts_with("failed to spawn ")
    }
}

/// Run `program` with a fixed argument vector, bounded by `timeout`.
///
/// Arguments are passed as discrete tokens; nothing is ever interpreted by a
/// shell. Captured stdout/stderr are each capped at `max_bytes` — excess
/// output is drained and dropped, never a reason to kill the process. On
/// timeout the process is killed and the result reports status 124. On spawn
/// failure the result reports status 1 with the OS error in `stderr`.
pub async fn run_command(
    program: &str,
    args: &[&str],
    cwd: &Path,
    timeout: Duration,
    max_bytes: usize,
) -> CommandResult {
    let mut child = match Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            return CommandResult {
                status: 1,
                stdout: String::new(),
                stderr: format!("failed to spawn {program}: {e}"),
            };
        }
    };

    // Stream capture runs concurrently with the wait so a chatty child never
    // deadlocks on a full pipe.
    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let stdout_task = tokio::spawn(read_capped(stdout_pipe, max_bytes));
    let stderr_task = tokio::spawn(read_capped(stderr_pipe, max_bytes));

    let waited = tokio::time::timeout(timeout, child.wait()).await;
    let status = match waited {
        Ok(Ok(status)) => status.code().unwrap_or(-1),
        Ok(Err(e)) => {
            tracing::warn!("wait on {program} failed: {e}");
            -1
        }
        Err(_) => {
            tracing::warn!(
                "{program} exceeded {}s timeout, killing",
                timeout.as_secs()
            );
            if let Err(e) = child.kill().await {
                tracing::warn!("kill failed: {e}");
            }
            TIMEOUT_EXIT_STATUS
        }
    };

    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    CommandResult {
        status,
        stdout,
        stderr,
    }
}

/// Read a child pipe to EOF, keeping at most `max_bytes` bytes.
///
/// Bytes past the cap are read and discarded so the child can finish
/// writing. Lossy UTF-8 conversion; the cap may land mid-codepoint.
async fn read_capped(
    pipe: Option<impl tokio::io::AsyncRead + Unpin>,
    max_bytes: usize,
) -> String {
    let Some(mut pipe) = pipe else {
        return String::new();
    };

    let mut captured: Vec<u8> = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if captured.len() < max_bytes {
                    let room = max_bytes - captured.len();
                    captured.extend_from_slice(&buf[..n.min(room)]);
                }
            }
            Err(e) => {
                tracing::debug!("pipe read error: {e}");
                break;
            }
        }
    }

    String::from_utf8_lossy(&captured).into_owned()
}
