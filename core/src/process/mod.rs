//! Process management for supervised workers
//!
//! [`spawn`] launches a worker's executable with piped stdout/stderr and the
//! worker's environment overrides layered over the inherited environment.
//! The resulting [`ChildProcess`] is owned by the worker for the whole run
//! and is never handed out.
//!
//! ## Platform Support
//!
//! - **Unix**: the child leads its own process group, so interrupt and kill
//!   reach everything it spawned
//! - **Other targets**: only forced termination of the child itself

#[cfg(unix)]
pub mod unix;

use crate::{CoreError, Result};
use schema::WorkerSpec;
use std::process::{ExitStatus, Stdio};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tracing::{debug, error};

/// A spawned worker process
#[derive(Debug)]
pub struct ChildProcess {
    /// Name of the worker that owns the process, for log attribution
    worker: String,
    /// Process ID captured at spawn; stays valid after the child is reaped
    pid: u32,
    child: Child,
}

/// Spawn the process described by `spec`
///
/// The environment is the inherited OS environment plus `spec.env` applied
/// in order, so a later duplicate key overrides an earlier one. stdin is
/// closed; stdout and stderr are piped for capture. The child is killed if
/// the handle is dropped before it has been waited on.
pub fn spawn(spec: &WorkerSpec) -> Result<ChildProcess> {
    debug!("Spawning worker '{}': {} {:?}", spec.name, spec.command, spec.args);

    let mut command = Command::new(&spec.command);
    command
        .args(&spec.args)
        .envs(spec.env_pairs())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    unix::configure_process_group(&mut command);

    let child = command.spawn().map_err(|e| {
        error!("Failed to spawn worker '{}' ({}): {}", spec.name, spec.command, e);
        CoreError::Launch {
            worker: spec.name.clone(),
            source: e,
        }
    })?;

    let pid = child.id().ok_or_else(|| CoreError::Launch {
        worker: spec.name.clone(),
        source: std::io::Error::other("spawned child did not have a PID"),
    })?;
    debug!("Worker '{}' running as pid {}", spec.name, pid);

    Ok(ChildProcess {
        worker: spec.name.clone(),
        pid,
        child,
    })
}

impl ChildProcess {
    /// Get the process ID
    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Name of the worker that owns this process
    pub fn worker(&self) -> &str {
        &self.worker
    }

    /// Wait for the process to exit and return its exit status
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        self.child.wait().await.map_err(|e| {
            CoreError::ProcessWait(format!("Failed to wait for process {}: {}", self.pid, e))
        })
    }

    /// Try to wait for the process to exit without blocking
    pub fn try_wait(&mut self) -> Result<Option<ExitStatus>> {
        self.child.try_wait().map_err(|e| {
            CoreError::ProcessWait(format!(
                "Failed to try_wait for process {}: {}",
                self.pid, e
            ))
        })
    }

    /// Take the stdout handle for async reading, if available
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take the stderr handle for async reading, if available
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Ask the process to stop (SIGINT to its process group)
    #[cfg(unix)]
    pub fn interrupt(&mut self) -> Result<()> {
        unix::signal_interrupt_group(self.pid)
    }

    /// Graceful interrupt is not available on this target
    #[cfg(not(unix))]
    pub fn interrupt(&mut self) -> Result<()> {
        Err(CoreError::ProcessSignal(format!(
            "interrupt is not supported for process {} on this platform",
            self.pid
        )))
    }

    /// Forcefully terminate the process (SIGKILL to its process group)
    #[cfg(unix)]
    pub fn kill(&mut self) -> Result<()> {
        unix::signal_kill_group(self.pid)
    }

    /// Forcefully terminate the process
    #[cfg(not(unix))]
    pub fn kill(&mut self) -> Result<()> {
        self.child.start_kill().map_err(|e| {
            CoreError::ProcessSignal(format!("Failed to kill process {}: {}", self.pid, e))
        })
    }
}
