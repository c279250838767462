//! Worker roster supervision
//!
//! A [`Supervisor`] owns an ordered roster of workers and runs them as one
//! unit. It is itself a [`Worker`], so supervisors nest:
//!
//! ```text
//! start ─► launch workers in order, each waiting for its readiness
//!       ─► report ready
//!       ─► wait until any worker finishes or cancellation fires
//!       ─► cancel the rest and join them all
//! ```
//!
//! Any worker ending ends the whole roster. There are no restarts; callers
//! that want retries wrap the supervisor.

use crate::logging::LogSink;
use crate::termination;
use crate::worker::{notify_ready, CommandWorker, Worker};
use crate::{CoreError, Result};
use async_trait::async_trait;
use schema::RosterFile;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type Finished = (String, Result<()>);

/// Runs a roster of workers under one cancellation signal
pub struct Supervisor {
    name: String,
    workers: Vec<Arc<dyn Worker>>,
}

impl Supervisor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
        }
    }

    /// Build a supervisor of [`CommandWorker`]s from a validated roster
    pub fn from_roster(roster: &RosterFile, sink: Arc<dyn LogSink>) -> Self {
        let settings = &roster.supervisor;
        let strategy = termination::from_kind(
            settings.termination,
            settings.kill_after_secs.map(Duration::from_secs),
        );

        let mut supervisor = Self::new(settings.name.clone());
        for spec in &roster.workers {
            let worker = CommandWorker::new(spec.clone())
                .with_termination(strategy.clone())
                .with_sink(sink.clone());
            supervisor.push(Arc::new(worker));
        }
        supervisor
    }

    /// Append a worker; workers launch in insertion order
    pub fn push(&mut self, worker: Arc<dyn Worker>) {
        self.workers.push(worker);
    }

    pub fn with_worker(mut self, worker: impl Worker + 'static) -> Self {
        self.push(Arc::new(worker));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Names of the supervised workers in launch order
    pub fn worker_names(&self) -> Vec<String> {
        self.workers.iter().map(|w| w.to_string()).collect()
    }
}

impl fmt::Display for Supervisor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn joined(result: std::result::Result<Finished, JoinError>) -> Option<Finished> {
    match result {
        Ok(finished) => Some(finished),
        Err(e) => {
            error!("Worker task failed: {}", e);
            None
        }
    }
}

#[async_trait]
impl Worker for Supervisor {
    async fn start(&self, cancel: CancellationToken, ready: mpsc::Sender<()>) -> Result<()> {
        info!("Supervisor '{}' starting {} workers", self.name, self.workers.len());

        let children = cancel.child_token();
        let mut tasks: JoinSet<Finished> = JoinSet::new();
        // First worker to end on its own, if any; None inside means it panicked
        let mut trigger: Option<Option<Finished>> = None;

        'launch: for worker in &self.workers {
            let (ready_tx, mut ready_rx) = mpsc::channel(1);
            let task_worker = worker.clone();
            let token = children.clone();
            tasks.spawn(async move {
                let name = task_worker.to_string();
                let result = task_worker.start(token, ready_tx).await;
                (name, result)
            });

            tokio::select! {
                biased;
                _ = cancel.cancelled() => break 'launch,
                Some(result) = tasks.join_next() => {
                    trigger = Some(joined(result));
                    break 'launch;
                }
                Some(()) = ready_rx.recv() => {
                    debug!("Supervisor '{}': worker '{}' ready", self.name, worker);
                }
            }
        }

        notify_ready(&self.name, &ready);

        if trigger.is_none() && !cancel.is_cancelled() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                Some(result) = tasks.join_next() => trigger = Some(joined(result)),
            }
        }

        children.cancel();
        let mut finished: Vec<Finished> = Vec::with_capacity(self.workers.len());
        let trigger_name = match trigger {
            Some(Some((name, result))) => {
                info!("Supervisor '{}': worker '{}' stopped, cancelling the rest", self.name, name);
                finished.push((name.clone(), result));
                Some(name)
            }
            Some(None) => None,
            None => {
                info!("Supervisor '{}' cancelled", self.name);
                None
            }
        };
        while let Some(result) = tasks.join_next().await {
            finished.extend(joined(result));
        }

        for (name, result) in finished {
            match result {
                Err(e) if !e.is_cancelled() => {
                    error!("Supervisor '{}': worker '{}' failed: {}", self.name, name, e);
                    return Err(e);
                }
                _ => {}
            }
        }

        match trigger_name {
            Some(worker) => Err(CoreError::WorkerExited { worker }),
            None if cancel.is_cancelled() => Err(CoreError::Cancelled {
                worker: self.name.clone(),
            }),
            None => Err(CoreError::Other(format!(
                "supervisor '{}' lost a worker task",
                self.name
            ))),
        }
    }
}
