//! Lifecycle tests for command workers
//!
//! These drive real `/bin/sh` processes through the readiness handshake,
//! natural exit, cancellation and output capture.

#![cfg(unix)]

mod common;

use common::*;
use corral_core::process::unix::is_running;
use corral_core::{
    CancellationToken, CommandWorker, CoreError, Interrupt, LogLine, LogStream, Worker,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn readiness_is_sent_once_before_start_returns() {
    run_with_default_timeout(async {
        let worker = CommandWorker::new(sh("steady", "exec sleep 30"));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);

        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.start(cancel, tx).await }
        });

        rx.recv().await.expect("worker should report ready");
        assert!(!run.is_finished(), "start must still be running after readiness");

        cancel.cancel();
        let result = run.await.unwrap();
        assert!(result.unwrap_err().is_cancelled());
        assert!(rx.try_recv().is_err(), "only one readiness notification");
    })
    .await;
}

#[tokio::test]
async fn clean_exit_returns_ok() {
    run_with_default_timeout(async {
        let worker = CommandWorker::new(sh("oneshot", "exit 0"));
        let (tx, mut rx) = mpsc::channel(1);

        worker
            .start(CancellationToken::new(), tx)
            .await
            .expect("clean exit should be Ok");
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    })
    .await;
}

#[tokio::test]
async fn exit_code_one_is_abnormal_and_never_terminated() {
    run_with_default_timeout(async {
        let strategy = Arc::new(CountingKill::default());
        let worker =
            CommandWorker::new(sh("failing", "exit 1")).with_termination(strategy.clone());
        let (tx, _rx) = mpsc::channel(1);

        let err = worker.start(CancellationToken::new(), tx).await.unwrap_err();

        match &err {
            CoreError::AbnormalExit { worker, status } => {
                assert_eq!(worker, "failing");
                assert_eq!(status.code(), Some(1));
            }
            other => panic!("expected AbnormalExit, got {other:?}"),
        }
        assert_eq!(err.exit_code(), Some(1));
        assert_eq!(strategy.calls(), 0, "no termination without cancellation");
    })
    .await;
}

#[tokio::test]
async fn cancellation_after_launch_stops_the_process() {
    run_with_default_timeout(async {
        let ring = ring();
        let worker = CommandWorker::new(sh("server", "echo $$; exec sleep 30"))
            .with_sink(ring.clone());
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);

        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.start(cancel, tx).await }
        });
        rx.recv().await.unwrap();

        let pid = eventually(Duration::from_secs(5), || reported_pid(&ring, "server"))
            .await
            .expect("worker should print its pid");
        assert!(is_running(pid));

        cancel.cancel();
        let err = run.await.unwrap().unwrap_err();
        match err {
            CoreError::Cancelled { worker } => assert_eq!(worker, "server"),
            other => panic!("expected Cancelled, got {other:?}"),
        }

        let gone = eventually(Duration::from_secs(2), || (!is_running(pid)).then_some(())).await;
        assert!(gone.is_some(), "process {pid} still running after cancellation");
    })
    .await;
}

#[tokio::test]
async fn cancellation_racing_launch_leaves_nothing_running() {
    run_with_default_timeout(async {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("pid");
        let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
        let worker = CommandWorker::new(sh("racer", &script));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);

        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.start(cancel, tx).await }
        });
        cancel.cancel();

        let err = run.await.unwrap().unwrap_err();
        assert!(err.is_cancelled());
        assert!(rx.try_recv().is_ok());

        // If the shell got far enough to record its pid, it must be gone now
        if let Some(pid) = pid_from_file(&pid_file) {
            let gone =
                eventually(Duration::from_secs(2), || (!is_running(pid)).then_some(())).await;
            assert!(gone.is_some(), "process {pid} survived cancellation");
        }
    })
    .await;
}

#[tokio::test]
async fn output_is_attributed_to_stream_and_worker() {
    run_with_default_timeout(async {
        let ring = ring();
        let worker =
            CommandWorker::new(sh("talker", "echo A; echo B >&2")).with_sink(ring.clone());
        let (tx, _rx) = mpsc::channel(1);

        worker.start(CancellationToken::new(), tx).await.unwrap();

        let mut lines = ring.lock().unwrap().lines_for("talker");
        lines.sort_by_key(|line| line.stream.as_str());
        assert_eq!(
            lines,
            vec![
                LogLine::new("talker", LogStream::Stderr, "B"),
                LogLine::new("talker", LogStream::Stdout, "A"),
            ]
        );
    })
    .await;
}

#[tokio::test]
async fn partial_final_line_is_captured() {
    run_with_default_timeout(async {
        let ring = ring();
        let worker =
            CommandWorker::new(sh("printer", "printf 'no newline'")).with_sink(ring.clone());
        let (tx, _rx) = mpsc::channel(1);

        worker.start(CancellationToken::new(), tx).await.unwrap();

        let lines = ring.lock().unwrap().lines_for("printer");
        assert_eq!(lines, vec![LogLine::new("printer", LogStream::Stdout, "no newline")]);
    })
    .await;
}

#[tokio::test]
async fn repeated_cancellation_is_harmless() {
    run_with_default_timeout(async {
        let strategy = Arc::new(CountingKill::default());
        let worker = CommandWorker::new(sh("sleepy", "exec sleep 30"))
            .with_termination(strategy.clone());
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(4);

        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.start(cancel, tx).await }
        });
        rx.recv().await.unwrap();

        let cancellers: Vec<_> = (0..4)
            .map(|_| {
                let cancel = cancel.clone();
                tokio::spawn(async move { cancel.cancel() })
            })
            .collect();
        for canceller in cancellers {
            canceller.await.unwrap();
        }
        cancel.cancel();

        assert!(run.await.unwrap().unwrap_err().is_cancelled());
        assert_eq!(strategy.calls(), 1);
        assert!(rx.try_recv().is_err(), "no second readiness notification");
    })
    .await;
}

#[tokio::test]
async fn interrupt_escalates_to_kill_after_grace() {
    run_with_default_timeout(async {
        let ring = ring();
        let worker = CommandWorker::new(sh(
            "stubborn",
            "trap '' INT; echo $$; while true; do sleep 0.1; done",
        ))
        .with_sink(ring.clone())
        .with_termination(Arc::new(Interrupt::with_kill_after(Duration::from_millis(300))));
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);

        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.start(cancel, tx).await }
        });
        rx.recv().await.unwrap();
        let pid = eventually(Duration::from_secs(5), || reported_pid(&ring, "stubborn"))
            .await
            .expect("worker should print its pid");

        cancel.cancel();
        assert!(run.await.unwrap().unwrap_err().is_cancelled());

        let gone = eventually(Duration::from_secs(2), || (!is_running(pid)).then_some(())).await;
        assert!(gone.is_some(), "stubborn process {pid} survived escalation");
    })
    .await;
}

#[tokio::test]
async fn launch_failure_is_reported_after_readiness() {
    run_with_default_timeout(async {
        let worker = CommandWorker::new(corral_core::WorkerSpec::new(
            "missing",
            "/nonexistent/corral-test-binary",
        ));
        let (tx, mut rx) = mpsc::channel(1);

        let err = worker.start(CancellationToken::new(), tx).await.unwrap_err();

        assert_eq!(err.code(), "CORE010");
        assert!(rx.try_recv().is_ok());
    })
    .await;
}

#[tokio::test]
async fn failed_termination_still_reports_cancelled() {
    let (warnings, _guard) = record_warnings();

    run_with_default_timeout(async {
        let ring = ring();
        let worker = CommandWorker::new(sh("stubborn", "echo $$; exec sleep 30"))
            .with_termination(Arc::new(RefusedTermination {
                reason: "Operation not permitted",
            }))
            .with_sink(ring.clone());
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::channel(1);

        let run = tokio::spawn({
            let cancel = cancel.clone();
            async move { worker.start(cancel, tx).await }
        });
        rx.recv().await.unwrap();

        let pid = eventually(Duration::from_secs(5), || reported_pid(&ring, "stubborn"))
            .await
            .expect("worker should print its pid");

        cancel.cancel();
        match run.await.unwrap() {
            Err(CoreError::Cancelled { worker }) => assert_eq!(worker, "stubborn"),
            other => panic!("expected Cancelled, got {other:?}"),
        }

        // Dropping the child handle is the last resort once signalling failed
        let gone = eventually(Duration::from_secs(5), || (!is_running(pid)).then_some(())).await;
        assert!(gone.is_some(), "process {pid} still running after cancellation");
    })
    .await;

    let events = warnings.events();
    let failure = events
        .iter()
        .find(|fields| fields.get("message").is_some_and(|m| m.contains("failed to terminate")))
        .unwrap_or_else(|| panic!("no termination warning in {events:?}"));
    assert_eq!(failure.get("worker").map(String::as_str), Some("stubborn"));
    assert!(
        failure
            .get("error")
            .is_some_and(|e| e.contains("Operation not permitted")),
        "{failure:?}"
    );
}
