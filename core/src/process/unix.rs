//! Unix process groups and signalling
//!
//! Every worker process calls `setsid()` before `exec`, becoming the leader
//! of a new session and process group with no controlling terminal. Signals
//! are then sent to the whole group, so helpers the worker forked are
//! stopped together with it, and a Ctrl-C typed at the supervisor's
//! terminal reaches the workers only through the supervisor's own
//! cancellation.

// setsid() must run between fork and exec
#![allow(unsafe_code)]

use crate::{CoreError, Result};
use nix::errno::Errno;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
#[allow(unused_imports)]
use std::os::unix::process::CommandExt;
use tokio::process::Command;
use tracing::debug;

/// Make the spawned child the leader of its own process group
pub(crate) fn configure_process_group(command: &mut Command) {
    // Safety: setsid() is async-signal-safe and touches no parent state
    unsafe {
        command.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

/// Send `signal` to the process group led by `pid`
///
/// Failures are reported rather than swallowed: `ESRCH` means the group is
/// already gone and `EPERM` means it can no longer be signalled. Callers on
/// the cancellation path log these and carry on.
pub fn signal_group(pid: u32, signal: Signal) -> Result<()> {
    let pgid = Pid::from_raw(pid as i32);
    debug!("Sending {} to process group {}", signal, pgid);

    killpg(pgid, signal).map_err(|e| {
        let reason = match e {
            Errno::ESRCH => "process already finished".to_string(),
            other => other.desc().to_string(),
        };
        CoreError::ProcessSignal(format!(
            "Failed to send {} to process group {}: {}",
            signal, pgid, reason
        ))
    })
}

/// Send SIGINT to the process group for a graceful stop
pub fn signal_interrupt_group(pid: u32) -> Result<()> {
    signal_group(pid, Signal::SIGINT)
}

/// Send SIGKILL to the process group for forceful termination
pub fn signal_kill_group(pid: u32) -> Result<()> {
    signal_group(pid, Signal::SIGKILL)
}

/// Whether a process with this ID exists in the process table
///
/// Uses the null signal, so an unreaped zombie still counts as present.
pub fn is_running(pid: u32) -> bool {
    match kill(Pid::from_raw(pid as i32), None::<Signal>) {
        Ok(()) => true,
        Err(Errno::EPERM) => true,
        Err(_) => false,
    }
}
