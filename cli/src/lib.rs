//! Library side of the `corral` command
//!
//! Loads a roster, turns it into a [`Supervisor`] and runs it until a worker
//! stops or the process receives a shutdown signal.

pub mod error;

pub use error::{CliError, Result};

use corral_core::config::load_roster_from_toml_path;
use corral_core::{
    CancellationToken, CoreError, LogRing, LogSink, RosterFile, Supervisor, TeeSink,
    TerminationKind, TracingSink, Worker,
};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::info;

/// Load and validate the roster at `path`
pub fn load_roster(path: impl AsRef<Path>) -> Result<RosterFile> {
    Ok(load_roster_from_toml_path(path)?)
}

/// Supervisor for `roster` whose workers log output through `tracing`.
///
/// When `recent` is given, captured output is also kept there so a failing
/// worker's last lines can be reported with [`failure_report`].
pub fn build_supervisor(roster: &RosterFile, recent: Option<Arc<Mutex<LogRing>>>) -> Supervisor {
    let sink: Arc<dyn LogSink> = match recent {
        Some(ring) => {
            let sinks: Vec<Arc<dyn LogSink>> = vec![Arc::new(TracingSink), ring];
            Arc::new(TeeSink::new(sinks))
        }
        None => Arc::new(TracingSink),
    };
    Supervisor::from_roster(roster, sink)
}

/// Warning for rosters whose workers may ignore an interrupt forever.
///
/// Interrupt without `killAfterSecs` leaves the exit to the worker, so a
/// worker that ignores SIGINT keeps `corral run` waiting after Ctrl-C.
pub fn unbounded_shutdown_warning(roster: &RosterFile) -> Option<String> {
    let settings = &roster.supervisor;
    let interrupts = match settings.termination {
        TerminationKind::Interrupt => true,
        TerminationKind::Platform => cfg!(unix),
        TerminationKind::Kill => false,
    };
    (interrupts && settings.kill_after_secs.is_none()).then(|| {
        format!(
            "supervisor '{}' interrupts workers without killAfterSecs; \
             a worker that ignores SIGINT will block shutdown",
            settings.name
        )
    })
}

/// Ring sized to hold `tail` lines for every worker in `roster`
pub fn recent_output(roster: &RosterFile, tail: usize) -> Option<Arc<Mutex<LogRing>>> {
    (tail > 0).then(|| LogRing::shared(tail.saturating_mul(roster.workers.len().max(1))))
}

/// Last `tail` output lines of the worker `err` blames, if any were captured
pub fn failure_report(err: &CliError, recent: &Mutex<LogRing>, tail: usize) -> Option<String> {
    let worker = match err {
        CliError::Core(
            CoreError::Launch { worker, .. }
            | CoreError::AbnormalExit { worker, .. }
            | CoreError::WorkerExited { worker },
        ) => worker,
        _ => return None,
    };

    let lines = recent
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .tail_for(worker, tail);
    if lines.is_empty() {
        return None;
    }

    let mut out = format!("last {} output lines of '{}':\n", lines.len(), worker);
    for line in lines {
        out.push_str(&format!("  [{}] {}\n", line.stream, line.text));
    }
    Some(out)
}

/// Run `supervisor` until a worker stops or `cancel` fires.
///
/// Cancellation is the normal way to stop a roster, so it maps to `Ok`.
pub async fn run_supervisor(supervisor: Supervisor, cancel: CancellationToken) -> Result<()> {
    let (ready_tx, mut ready_rx) = mpsc::channel(1);
    let name = supervisor.name().to_string();
    let count = supervisor.len();

    let announce = tokio::spawn(async move {
        if ready_rx.recv().await.is_some() {
            info!("Supervisor '{}' launched {} workers", name, count);
        }
    });

    let outcome = supervisor.start(cancel, ready_tx).await;
    announce.abort();

    match outcome {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => {
            info!("Shutdown complete");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Human-readable listing of a roster
pub fn roster_summary(roster: &RosterFile) -> String {
    let mut out = format!(
        "supervisor '{}' (termination: {:?}",
        roster.supervisor.name, roster.supervisor.termination
    );
    if let Some(secs) = roster.supervisor.kill_after_secs {
        out.push_str(&format!(", kill after {}s", secs));
    }
    out.push_str(")\n");
    for worker in &roster.workers {
        out.push_str(&format!("  {}: {}", worker.name, worker.command));
        for arg in &worker.args {
            out.push(' ');
            out.push_str(arg);
        }
        if !worker.env.is_empty() {
            out.push_str(&format!(" [{} env]", worker.env.len()));
        }
        out.push('\n');
    }
    out
}

/// JSON Schema of the roster file format
pub fn roster_schema_json() -> Result<String> {
    let schema = schemars::schema_for!(RosterFile);
    Ok(serde_json::to_string_pretty(&schema)?)
}

/// Waits for a termination signal.
///
/// Unix: SIGINT, SIGTERM or SIGQUIT.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let register = |kind: SignalKind| {
        signal(kind).map_err(|e| CliError::SignalError(e.to_string()))
    };
    let mut sigint = register(SignalKind::interrupt())?;
    let mut sigterm = register(SignalKind::terminate())?;
    let mut sigquit = register(SignalKind::quit())?;

    tokio::select! {
        _ = sigint.recv() => info!("Received SIGINT"),
        _ = sigterm.recv() => info!("Received SIGTERM"),
        _ = sigquit.recv() => info!("Received SIGQUIT"),
    }
    Ok(())
}

/// Waits for a termination signal (Ctrl-C).
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| CliError::SignalError(e.to_string()))?;
    info!("Received Ctrl+C");
    Ok(())
}
