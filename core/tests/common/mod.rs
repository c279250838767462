//! Test utilities for integration tests in the core crate.
#![allow(dead_code)]

use corral_core::process::ChildProcess;
use corral_core::{CoreError, Kill, LogRing, Result, TerminationStrategy, WorkerSpec};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Run the given future with a timeout, failing the test if it elapses.
pub async fn run_with_timeout<F, T>(duration: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(duration, fut)
        .await
        .expect("test timed out")
}

/// Run a future with a default timeout of 20 seconds.
pub async fn run_with_default_timeout<F, T>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    run_with_timeout(Duration::from_secs(20), fut).await
}

/// Spec running `script` through `/bin/sh -c`
pub fn sh(name: &str, script: &str) -> WorkerSpec {
    let mut spec = WorkerSpec::new(name, "/bin/sh");
    spec.args = vec!["-c".to_string(), script.to_string()];
    spec
}

pub fn ring() -> Arc<Mutex<LogRing>> {
    LogRing::shared(256)
}

/// Poll `check` every 20ms until it returns `Some`, or give up after `limit`
pub async fn eventually<T>(limit: Duration, mut check: impl FnMut() -> Option<T>) -> Option<T> {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if let Some(value) = check() {
            return Some(value);
        }
        if tokio::time::Instant::now() >= deadline {
            return None;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// First captured stdout line of `worker` parsed as a PID
pub fn reported_pid(ring: &Mutex<LogRing>, worker: &str) -> Option<u32> {
    let ring = ring.lock().unwrap();
    ring.lines_for(worker)
        .into_iter()
        .find_map(|line| line.text.trim().parse().ok())
}

/// PID a worker script wrote to `path`, once the file is complete
pub fn pid_from_file(path: &Path) -> Option<u32> {
    let text = std::fs::read_to_string(path).ok()?;
    text.strip_suffix('\n')?.parse().ok()
}

/// Kill strategy that counts how often it is invoked
#[derive(Debug, Default)]
pub struct CountingKill {
    calls: AtomicUsize,
}

impl CountingKill {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TerminationStrategy for CountingKill {
    fn name(&self) -> &'static str {
        "counting-kill"
    }

    fn terminate(&self, process: &mut ChildProcess) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Kill.terminate(process)
    }
}

/// Strategy whose termination call always fails without touching the process
#[derive(Debug)]
pub struct RefusedTermination {
    pub reason: &'static str,
}

impl TerminationStrategy for RefusedTermination {
    fn name(&self) -> &'static str {
        "refused"
    }

    fn terminate(&self, _process: &mut ChildProcess) -> Result<()> {
        Err(CoreError::ProcessSignal(self.reason.to_string()))
    }
}

/// Fields of one recorded `tracing` event, rendered as text
pub type EventFields = BTreeMap<String, String>;

/// `tracing` layer that keeps the fields of every warn-level event
#[derive(Clone, Default)]
pub struct WarnRecorder {
    events: Arc<Mutex<Vec<EventFields>>>,
}

impl WarnRecorder {
    pub fn events(&self) -> Vec<EventFields> {
        self.events.lock().unwrap().clone()
    }
}

struct FieldText<'a>(&'a mut EventFields);

impl tracing::field::Visit for FieldText<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().to_string(), format!("{:?}", value));
    }

    fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
        self.0.insert(field.name().to_string(), value.to_string());
    }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnRecorder {
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        let mut fields = EventFields::new();
        event.record(&mut FieldText(&mut fields));
        self.events.lock().unwrap().push(fields);
    }
}

/// Route this thread's `tracing` events through a fresh [`WarnRecorder`]
pub fn record_warnings() -> (WarnRecorder, tracing::subscriber::DefaultGuard) {
    use tracing_subscriber::layer::SubscriberExt;

    let recorder = WarnRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (recorder, guard)
}
