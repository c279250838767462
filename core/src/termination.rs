//! Termination strategies for cancelled workers
//!
//! When a worker's cancellation token fires, the worker hands its live
//! process to a [`TerminationStrategy`]. Two variants exist:
//!
//! - [`Interrupt`]: graceful SIGINT to the process group. If the signal
//!   cannot be delivered the strategy falls back to a kill. With
//!   `kill_after` set, the worker escalates to a kill once the grace period
//!   passes; otherwise the process decides how and when to exit.
//! - [`Kill`]: one forced termination attempt, no retries.
//!
//! [`platform_default`] picks the variant for the build target, so the
//! worker itself stays free of platform branches.

use crate::process::ChildProcess;
use crate::Result;
use schema::TerminationKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Policy for ending a running process after cancellation
pub trait TerminationStrategy: Send + Sync + fmt::Debug {
    /// Short name used in log records
    fn name(&self) -> &'static str;

    /// Ask `process` to end. Called at most once per worker run.
    ///
    /// A failure is returned to the caller, which logs it and never retries.
    fn terminate(&self, process: &mut ChildProcess) -> Result<()>;

    /// Grace period after `terminate` before the worker forces a kill
    fn kill_after(&self) -> Option<Duration> {
        None
    }
}

/// Graceful interrupt with kill fallback
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Interrupt {
    kill_after: Option<Duration>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Escalate to a kill if the process outlives `grace` after the interrupt
    pub fn with_kill_after(grace: Duration) -> Self {
        Self {
            kill_after: Some(grace),
        }
    }
}

impl TerminationStrategy for Interrupt {
    fn name(&self) -> &'static str {
        "interrupt"
    }

    fn terminate(&self, process: &mut ChildProcess) -> Result<()> {
        match process.interrupt() {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(
                    worker = %process.worker(),
                    error = %e,
                    "command: failed to interrupt process, killing it"
                );
                Kill.terminate(process)
            }
        }
    }

    fn kill_after(&self) -> Option<Duration> {
        self.kill_after
    }
}

/// Forced termination only
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Kill;

impl TerminationStrategy for Kill {
    fn name(&self) -> &'static str {
        "kill"
    }

    fn terminate(&self, process: &mut ChildProcess) -> Result<()> {
        process.kill()
    }
}

/// The strategy this build target supports best
#[cfg(unix)]
pub fn platform_default() -> Arc<dyn TerminationStrategy> {
    Arc::new(Interrupt::new())
}

/// The strategy this build target supports best
#[cfg(not(unix))]
pub fn platform_default() -> Arc<dyn TerminationStrategy> {
    // Graceful interrupt of a child is not available here
    Arc::new(Kill)
}

/// Build the strategy named by roster settings
pub fn from_kind(kind: TerminationKind, kill_after: Option<Duration>) -> Arc<dyn TerminationStrategy> {
    let interrupt = || -> Arc<dyn TerminationStrategy> {
        match kill_after {
            Some(grace) => Arc::new(Interrupt::with_kill_after(grace)),
            None => Arc::new(Interrupt::new()),
        }
    };

    match kind {
        TerminationKind::Interrupt => interrupt(),
        TerminationKind::Kill => Arc::new(Kill),
        #[cfg(unix)]
        TerminationKind::Platform => interrupt(),
        #[cfg(not(unix))]
        TerminationKind::Platform => platform_default(),
    }
}
