//! Spawn a child command in its own process group and tear the whole tree
//! down with graceful-then-forceful group signals.

use crate::output::OutputRing;
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;

/// Liveness poll interval during teardown.
const POLL_INTERVAL: Duration = Duration::from_millis(25);
/// Grace added after the stop deadline for the forceful phase to land.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// How the child exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildExit {
    /// Exit code when the child exited normally.
    pub code: Option<i32>,
    /// Whether the child was terminated by a signal.
    pub signaled: bool,
}

impl ChildExit {
    pub fn success(&self) -> bool {
        self.code == Some(0) && !self.signaled
    }
}

/// Result of a completed [`Supervisor::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The tree was confirmed gone.
    Stopped,
    /// No child was running; the call was a no-op.
    NotRunning,
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("a child is already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("spawned child had no pid")]
    NoPid,

    #[error("process tree survived teardown (pid {pid}): term: {term}; kill: {kill}")]
    TreeSurvived { pid: u32, term: String, kill: String },
}

struct Handle {
    pid: u32,
    pgid: i32,
    exit_rx: watch::Receiver<Option<ChildExit>>,
}

/// Supervises at most one child process tree at a time.
///
/// Shared and cheap to clone; all mutation goes through the inner lock.
#[derive(Clone)]
pub struct Supervisor {
    output: OutputRing,
    inner: Arc<Mutex<Option<Handle>>>,
}

impl Supervisor {
    pub fn new(output: OutputRing) -> Self {
        Self { output, inner: Arc::new(Mutex::new(None)) }
    }

    /// Launch `command` in a new process group so one group signal reaches
    /// every descendant. Returns the root child pid.
    pub async fn start(
        &self,
        command: &str,
        args: &[String],
        dir: &Path,
    ) -> Result<u32, SupervisorError> {
        {
            let inner = self.inner.lock();
            if let Some(handle) = inner.as_ref() {
                if handle.exit_rx.borrow().is_none() {
                    return Err(SupervisorError::AlreadyRunning { pid: handle.pid });
                }
            }
        }

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .current_dir(dir)
            .process_group(0)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            command: command.to_string(),
            source,
        })?;
        let pid = child.id().ok_or(SupervisorError::NoPid)?;
        // The child is the leader of its own (new) group.
        let pgid = pid as i32;

        self.output.clear();
        if let Some(stdout) = child.stdout.take() {
            self.spawn_reader(stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            self.spawn_reader(stderr);
        }

        let (exit_tx, exit_rx) = watch::channel(None);
        tokio::spawn(async move {
            let exit = match child.wait().await {
                Ok(status) => ChildExit {
                    code: status.code(),
                    signaled: status.code().is_none(),
                },
                Err(e) => {
                    tracing::error!(error = %e, "child wait failed");
                    ChildExit { code: None, signaled: false }
                }
            };
            let _ = exit_tx.send(Some(exit));
        });

        *self.inner.lock() = Some(Handle { pid, pgid, exit_rx });
        tracing::info!(pid, command, "child started in new process group");
        Ok(pid)
    }

    fn spawn_reader(&self, stream: impl tokio::io::AsyncRead + Unpin + Send + 'static) {
        let output = self.output.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stream).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                output.push(&line);
            }
        });
    }

    /// Pid of the live child, if any.
    pub fn pid(&self) -> Option<u32> {
        let inner = self.inner.lock();
        inner
            .as_ref()
            .filter(|h| h.exit_rx.borrow().is_none())
            .map(|h| h.pid)
    }

    /// Whether a child is currently running.
    pub fn is_running(&self) -> bool {
        self.pid().is_some()
    }

    /// Receiver resolving to the child's exit, for the current run.
    pub fn exit_receiver(&self) -> Option<watch::Receiver<Option<ChildExit>>> {
        self.inner.lock().as_ref().map(|h| h.exit_rx.clone())
    }

    /// Redacted recent output of the current run.
    pub fn output(&self) -> &OutputRing {
        &self.output
    }

    /// Tear down the whole process tree.
    ///
    /// Graceful group TERM, then liveness polls every 25 ms up to `timeout`;
    /// if the tree is still alive, forceful group KILL plus a direct KILL on
    /// the root, polling until the deadline (plus a short grace). Repeated
    /// calls and calls with no child running are no-ops.
    pub async fn stop(&self, timeout: Duration) -> Result<StopOutcome, SupervisorError> {
        let (pid, pgid) = {
            let inner = self.inner.lock();
            match inner.as_ref() {
                Some(h) if h.exit_rx.borrow().is_none() => (h.pid, h.pgid),
                _ => return Ok(StopOutcome::NotRunning),
            }
        };

        let term_result = killpg(Pid::from_raw(pgid), Signal::SIGTERM);
        match term_result {
            Err(Errno::ESRCH) => {
                // Whole group already gone.
                tracing::debug!(pid, "group already down on TERM");
                return Ok(StopOutcome::Stopped);
            }
            Err(e) => tracing::warn!(pid, error = %e, "group TERM failed"),
            Ok(()) => {}
        }

        let deadline = tokio::time::Instant::now() + timeout;
        if self.poll_until_gone(pid, pgid, deadline).await {
            return Ok(StopOutcome::Stopped);
        }

        // Forceful phase: group first, then the root directly in case it
        // escaped its group.
        let kill_group = killpg(Pid::from_raw(pgid), Signal::SIGKILL);
        let kill_root = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
        let kill_result = kill_group.and(kill_root);

        let hard_deadline = deadline + KILL_GRACE;
        if self.poll_until_gone(pid, pgid, hard_deadline).await {
            return Ok(StopOutcome::Stopped);
        }

        Err(SupervisorError::TreeSurvived {
            pid,
            term: describe(term_result),
            kill: describe(kill_result),
        })
        .inspect_err(|e| tracing::error!(pgid, error = %e, "teardown failed"))
    }

    /// Poll root + group liveness until both are gone or the deadline passes.
    async fn poll_until_gone(&self, pid: u32, pgid: i32, deadline: tokio::time::Instant) -> bool {
        loop {
            if !tree_alive(pid, pgid, self.exit_receiver()) {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// Whether the root or any group member is still alive.
fn tree_alive(
    pid: u32,
    pgid: i32,
    exit_rx: Option<watch::Receiver<Option<ChildExit>>>,
) -> bool {
    // A reaped root shows up on the exit channel before the pid disappears.
    let root_exited = exit_rx
        .map(|rx| rx.borrow().is_some())
        .unwrap_or(false);
    let root_alive = !root_exited && !matches!(kill(Pid::from_raw(pid as i32), None), Err(Errno::ESRCH));
    let group_alive = !matches!(killpg(Pid::from_raw(pgid), None), Err(Errno::ESRCH));
    root_alive || group_alive
}

fn describe(result: Result<(), Errno>) -> String {
    match result {
        Ok(()) => "delivered".to_string(),
        Err(e) => e.to_string(),
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
