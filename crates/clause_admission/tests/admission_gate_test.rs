//! Tests for the combined rate-limit and admission path.

use clause_admission::{AdmissionGate, AdmissionStatus, CancellationToken};
use clause_error::{AdmissionError, AdmissionErrorKind};
use clause_settings::{AdmissionConfig, SharedSettings};
use std::sync::Arc;
use std::time::Duration;

fn gate(max_concurrent: usize, max_queue: usize, rate_limit: u32) -> AdmissionGate {
    let settings = SharedSettings::with_limits(max_concurrent, max_queue, rate_limit).unwrap();
    AdmissionGate::new(Arc::new(settings), &AdmissionConfig::default())
}

#[derive(Debug)]
enum TranscribeError {
    Admission(AdmissionError),
    Model,
}

impl From<AdmissionError> for TranscribeError {
    fn from(err: AdmissionError) -> Self {
        TranscribeError::Admission(err)
    }
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_is_checked_before_admission() {
    let gate = gate(5, 5, 2);
    let cancel = CancellationToken::new();

    drop(gate.admit("10.0.0.1", &cancel).await.unwrap());
    drop(gate.admit("10.0.0.1", &cancel).await.unwrap());
    let err = gate.admit("10.0.0.1", &cancel).await.unwrap_err();

    assert!(matches!(
        err.kind(),
        AdmissionErrorKind::RateLimited { limit: 2, .. }
    ));
    assert!(err.retry_after_secs().unwrap() > 0);
    assert_eq!(gate.status(), AdmissionStatus::default());

    let snapshot = gate.metrics().snapshot();
    assert_eq!(snapshot.proceeded, 2);
    assert_eq!(snapshot.rate_limited, 1);

    // Other clients are unaffected.
    drop(gate.admit("10.0.0.2", &cancel).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_full_system_reports_overloaded() {
    let gate = gate(1, 0, 100);
    let cancel = CancellationToken::new();

    let _held = gate.admit("10.0.0.1", &cancel).await.unwrap();
    let err = gate.admit("10.0.0.2", &cancel).await.unwrap_err();

    assert_eq!(err.kind(), &AdmissionErrorKind::Overloaded);
    assert!(err.to_string().contains("Try again later"));
    assert_eq!(gate.metrics().snapshot().rejected, 1);
}

#[tokio::test(start_paused = true)]
async fn test_run_releases_slot_when_work_fails() {
    let gate = gate(1, 0, 100);
    let cancel = CancellationToken::new();

    let result: Result<(), TranscribeError> = gate
        .run("10.0.0.1", &cancel, || async { Err(TranscribeError::Model) })
        .await;

    assert!(matches!(result, Err(TranscribeError::Model)));
    assert_eq!(gate.status(), AdmissionStatus::default());
}

#[tokio::test(start_paused = true)]
async fn test_run_converts_admission_errors() {
    let gate = gate(1, 0, 100);
    let cancel = CancellationToken::new();
    let _held = gate.admit("10.0.0.1", &cancel).await.unwrap();

    let result: Result<u32, TranscribeError> = gate
        .run("10.0.0.2", &cancel, || async { Ok(7) })
        .await;

    let Err(TranscribeError::Admission(err)) = result else {
        panic!("expected an admission error");
    };
    assert_eq!(err.kind(), &AdmissionErrorKind::Overloaded);
}

#[tokio::test]
async fn test_run_releases_slot_when_work_panics() {
    let gate = gate(1, 0, 100);

    let task = {
        let gate = gate.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            gate.run("10.0.0.1", &cancel, || async {
                if gate.status().active == 1 {
                    panic!("decoder crashed");
                }
                Ok::<_, AdmissionError>(())
            })
            .await
        })
    };

    assert!(task.await.unwrap_err().is_panic());
    assert_eq!(gate.status(), AdmissionStatus::default());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_queued_frees_the_queue_place() {
    let gate = gate(1, 1, 100);
    let cancel = CancellationToken::new();
    let _held = gate.admit("10.0.0.1", &cancel).await.unwrap();

    let waiter_cancel = CancellationToken::new();
    let waiter = {
        let gate = gate.clone();
        let waiter_cancel = waiter_cancel.clone();
        tokio::spawn(async move { gate.admit("10.0.0.2", &waiter_cancel).await })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(gate.status(), AdmissionStatus { active: 1, queued: 1 });

    waiter_cancel.cancel();
    let err = waiter.await.unwrap().unwrap_err();

    assert_eq!(err.kind(), &AdmissionErrorKind::Cancelled);
    assert_eq!(gate.status(), AdmissionStatus { active: 1, queued: 0 });
    assert_eq!(gate.metrics().snapshot().cancelled, 1);
}

#[tokio::test(start_paused = true)]
async fn test_queued_request_runs_after_holder_finishes() {
    let gate = gate(1, 1, 100);
    let cancel = CancellationToken::new();
    let held = gate.admit("10.0.0.1", &cancel).await.unwrap();

    let waiter = {
        let gate = gate.clone();
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            gate.run("10.0.0.2", &cancel, || async { Ok::<_, AdmissionError>("done") })
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    held.release();

    assert_eq!(waiter.await.unwrap().unwrap(), "done");
    let snapshot = gate.metrics().snapshot();
    assert_eq!(snapshot.queued, 1);
    assert_eq!(snapshot.promoted, 1);
    assert_eq!(gate.status(), AdmissionStatus::default());
}
