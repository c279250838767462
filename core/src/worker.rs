//! Worker lifecycle
//!
//! A [`Worker`] is anything a supervisor can start and cancel. The main
//! implementation, [`CommandWorker`], owns exactly one OS process per run:
//!
//! ```text
//! start ─► spawn ─► notify ready ─► wait ─┬─► exited on its own ─► Ok / AbnormalExit
//!                                         └─► cancelled ─► terminate ─► Cancelled
//! ```
//!
//! Readiness is sent right after the launch call returns, whether or not it
//! succeeded, and before the worker blocks on the process. The controller
//! never waits past the launch attempt for a go/no-go signal.

use crate::capture::OutputCapture;
use crate::logging::{LogSink, TracingSink};
use crate::process::{self, ChildProcess};
use crate::termination::{self, TerminationStrategy};
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::{LogStream, WorkerSpec};
use std::fmt;
use std::process::ExitStatus;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// How long a finished worker waits for its capture readers to hit EOF
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

/// A unit of supervised work
///
/// `start` runs until the work ends or `cancel` fires. It sends exactly one
/// notification on `ready` once the work has been launched; the send never
/// blocks, so `ready` should have room for it. A worker value is valid for
/// a single `start` call.
#[async_trait]
pub trait Worker: fmt::Display + Send + Sync {
    async fn start(&self, cancel: CancellationToken, ready: mpsc::Sender<()>) -> Result<()>;
}

/// Fire-and-forget readiness notification
pub(crate) fn notify_ready(worker: &str, ready: &mpsc::Sender<()>) {
    match ready.try_send(()) {
        Ok(()) => debug!("Worker '{}' reported ready", worker),
        Err(TrySendError::Full(())) => {
            warn!("Readiness channel for worker '{}' is full; notification dropped", worker)
        }
        Err(TrySendError::Closed(())) => {
            debug!("Nobody is waiting for readiness of worker '{}'", worker)
        }
    }
}

/// Worker that runs one long-lived external command
pub struct CommandWorker {
    spec: WorkerSpec,
    termination: Arc<dyn TerminationStrategy>,
    sink: Arc<dyn LogSink>,
    drain_timeout: Duration,
}

impl CommandWorker {
    /// Build a worker using the platform's termination strategy and
    /// forwarding output to `tracing`
    pub fn new(spec: WorkerSpec) -> Self {
        Self {
            spec,
            termination: termination::platform_default(),
            sink: Arc::new(TracingSink),
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }

    pub fn with_termination(mut self, termination: Arc<dyn TerminationStrategy>) -> Self {
        self.termination = termination;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_drain_timeout(mut self, drain_timeout: Duration) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn spec(&self) -> &WorkerSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    fn cancelled(&self) -> CoreError {
        CoreError::Cancelled {
            worker: self.spec.name.clone(),
        }
    }

    /// Map a process exit that was not caused by our own termination.
    ///
    /// Cancellation wins over whatever the exit looked like.
    fn natural_outcome(&self, waited: Result<ExitStatus>, cancelled: bool) -> Result<()> {
        if cancelled {
            return Err(self.cancelled());
        }
        let status = waited?;
        if status.success() {
            info!("Worker '{}' exited cleanly", self.name());
            Ok(())
        } else {
            info!("Worker '{}' exited with {}", self.name(), status);
            Err(CoreError::AbnormalExit {
                worker: self.spec.name.clone(),
                status,
            })
        }
    }

    fn attach_capture(&self, child: &mut ChildProcess) -> Vec<JoinHandle<u64>> {
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.take_stdout() {
            let capture = OutputCapture::new(self.name(), LogStream::Stdout, self.sink.clone());
            readers.push(capture.spawn(stdout));
        }
        if let Some(stderr) = child.take_stderr() {
            let capture = OutputCapture::new(self.name(), LogStream::Stderr, self.sink.clone());
            readers.push(capture.spawn(stderr));
        }
        readers
    }

    /// Give capture readers a bounded window to reach EOF. Readers still
    /// running afterwards are detached and finish on their own.
    async fn finish_capture(&self, readers: Vec<JoinHandle<u64>>) {
        let deadline = Instant::now() + self.drain_timeout;
        for reader in readers {
            if tokio::time::timeout_at(deadline, reader).await.is_err() {
                debug!("Output of worker '{}' still draining; detaching reader", self.name());
            }
        }
    }

    /// Run the termination strategy and wait for the process to go away.
    ///
    /// Never returns an error: a failed termination call has already been
    /// logged by the strategy, and the caller reports cancellation anyway.
    async fn shut_down(&self, child: &mut ChildProcess) {
        info!(
            "Cancelling worker '{}' (pid {}) with {} strategy",
            self.name(),
            child.pid(),
            self.termination.name()
        );

        if let Err(e) = self.termination.terminate(child) {
            warn!(worker = %self.name(), error = %e, "command: failed to terminate process");
            // Do not block on a process we could not signal; dropping the
            // handle kills it as a last resort.
            match child.try_wait() {
                Ok(Some(status)) => debug!("Worker '{}' already exited: {}", self.name(), status),
                Ok(None) => debug!("Worker '{}' still running after failed termination", self.name()),
                Err(e) => debug!("{}", e),
            }
            return;
        }

        let waited = match self.termination.kill_after() {
            None => child.wait().await,
            Some(grace) => {
                let graceful = timeout(grace, child.wait()).await;
                match graceful {
                    Ok(waited) => waited,
                    Err(_) => {
                        warn!(
                            "Worker '{}' did not exit within {:?} of interrupt, killing it",
                            self.name(),
                            grace
                        );
                        if let Err(e) = child.kill() {
                            warn!(worker = %self.name(), error = %e, "command: failed to kill process");
                            return;
                        }
                        child.wait().await
                    }
                }
            }
        };

        match waited {
            Ok(status) => debug!("Worker '{}' terminated: {}", self.name(), status),
            Err(e) => warn!("Worker '{}': {}", self.name(), e),
        }
    }
}

impl fmt::Display for CommandWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.spec.name)
    }
}

impl fmt::Debug for CommandWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandWorker")
            .field("spec", &self.spec)
            .field("termination", &self.termination)
            .field("drain_timeout", &self.drain_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Worker for CommandWorker {
    async fn start(&self, cancel: CancellationToken, ready: mpsc::Sender<()>) -> Result<()> {
        if cancel.is_cancelled() {
            info!("Worker '{}' cancelled before launch", self.name());
            notify_ready(self.name(), &ready);
            return Err(self.cancelled());
        }

        let launched = process::spawn(&self.spec);
        notify_ready(self.name(), &ready);
        let mut child = launched?;
        info!(worker = %self.name(), pid = child.pid(), "command: started process");

        let readers = self.attach_capture(&mut child);

        let exited = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            waited = child.wait() => Some(waited),
        };

        let result = match exited {
            None => {
                self.shut_down(&mut child).await;
                Err(self.cancelled())
            }
            Some(waited) => self.natural_outcome(waited, cancel.is_cancelled()),
        };

        self.finish_capture(readers).await;
        result
    }
}
