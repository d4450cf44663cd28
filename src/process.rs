// src/process.rs

//! Single external command execution with a deadline.
//!
//! The runner only reports what happened to the process. Deciding whether
//! a non-zero exit is a compile failure or a runtime failure belongs to the
//! executor that knows the toolchain.

use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::{Duration, Instant};

use sysinfo::{Pid, System};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

/// Per-stream capture cap. Anything beyond it is drained and discarded.
pub const MAX_CAPTURE_BYTES: u64 = 1024 * 1024;

/// Captured result of a process that ran to completion.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a process did not produce a `ProcessOutput`.
#[derive(Debug)]
pub enum RunFailure {
    /// Deadline expired; the process tree was killed.
    Timeout,
    /// The executable could not be located.
    ToolUnavailable(String),
    /// Any other OS-level failure while spawning or waiting.
    Io(io::Error),
}

/// Run `argv` in `cwd`, killing it (and its descendants) after `timeout`.
pub async fn run(
    argv: &[String],
    cwd: &Path,
    timeout: Duration,
) -> Result<ProcessOutput, RunFailure> {
    let (program, args) = argv.split_first().ok_or_else(|| {
        RunFailure::Io(io::Error::new(io::ErrorKind::InvalidInput, "empty command"))
    })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    // Own process group, so the whole tree can be signalled even after the
    // child has exited and left background processes re-parented to init.
    #[cfg(unix)]
    cmd.process_group(0);

    let start = Instant::now();
    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(program = %program, "executable not found");
            return Err(RunFailure::ToolUnavailable(program.clone()));
        }
        Err(e) => return Err(RunFailure::Io(e)),
    };

    let pid = child.id();
    tracing::debug!(program = %program, pid = ?pid, timeout = ?timeout, "spawned");

    let mut stdout_task = spawn_capture(child.stdout.take());
    let mut stderr_task = spawn_capture(child.stderr.take());

    let waited = tokio::time::timeout(timeout, async {
        let status = child.wait().await?;
        let stdout = (&mut stdout_task).await.unwrap_or_default();
        let stderr = (&mut stderr_task).await.unwrap_or_default();
        Ok::<_, io::Error>((status, stdout, stderr))
    })
    .await;

    match waited {
        Ok(Ok((status, stdout, stderr))) => {
            // Stragglers that closed their pipes do not outlive the call.
            #[cfg(unix)]
            if let Some(pid) = pid {
                kill_process_group(pid);
            }
            Ok(ProcessOutput {
                exit_code: status.code(),
                stdout,
                stderr,
                duration: start.elapsed(),
            })
        }
        Ok(Err(e)) => Err(RunFailure::Io(e)),
        Err(_) => {
            tracing::warn!(program = %program, pid = ?pid, "deadline expired, killing process tree");
            if let Some(pid) = pid {
                kill_tree(pid);
            }
            if let Err(e) = child.kill().await {
                tracing::debug!(program = %program, error = %e, "child already exited");
            }
            stdout_task.abort();
            stderr_task.abort();
            Err(RunFailure::Timeout)
        }
    }
}

/// Kill the child's process group, then anything still reachable through
/// parent links (processes that moved to a group of their own).
fn kill_tree(root: u32) {
    #[cfg(unix)]
    kill_process_group(root);
    kill_descendants(root);
}

/// SIGKILL every member of the group led by `leader`.
#[cfg(unix)]
fn kill_process_group(leader: u32) {
    use nix::errno::Errno;
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid as GroupId;

    let Ok(raw) = i32::try_from(leader) else {
        return;
    };

    match killpg(GroupId::from_raw(raw), Signal::SIGKILL) {
        Ok(()) => tracing::debug!(pgid = raw, "process group killed"),
        Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pgid = raw, error = %e, "failed to kill process group"),
    }
}

fn spawn_capture<R>(stream: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let Some(mut stream) = stream else {
            return String::new();
        };

        let mut buf = Vec::new();
        let _ = (&mut stream).take(MAX_CAPTURE_BYTES).read_to_end(&mut buf).await;
        let _ = tokio::io::copy(&mut stream, &mut tokio::io::sink()).await;

        String::from_utf8_lossy(&buf).into_owned()
    })
}

/// Kill every descendant of `root`, deepest first.
///
/// The root itself is left to the caller so it can be reaped.
fn kill_descendants(root: u32) {
    let mut system = System::new();
    system.refresh_processes();

    let mut doomed: Vec<Pid> = Vec::new();
    let mut frontier = vec![Pid::from_u32(root)];

    while let Some(parent) = frontier.pop() {
        for (pid, process) in system.processes() {
            if process.parent() == Some(parent) && !doomed.contains(pid) {
                doomed.push(*pid);
                frontier.push(*pid);
            }
        }
    }

    for pid in doomed.iter().rev() {
        if let Some(process) = system.process(*pid) {
            if !process.kill() {
                tracing::debug!(pid = pid.as_u32(), "descendant already gone");
            }
        }
    }
}
