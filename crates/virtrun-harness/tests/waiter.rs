// crates/virtrun-harness/tests/waiter.rs
// ============================================================================
// Module: Waiter Tests
// Description: Convergence-waiter timing and classification behavior.
// Purpose: Pin the poll/sleep/deadline contract under virtual time.
// Dependencies: virtrun-harness, virtrun-api, tokio
// ============================================================================

//! Waiter tests run under paused tokio time, so sleeps advance instantly and
//! elapsed virtual time is observable.

use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use tokio::time::Instant;
use virtrun_api::ClientError;
use virtrun_harness::PollConfig;
use virtrun_harness::WaitError;
use virtrun_harness::waiter::confirm_never;
use virtrun_harness::waiter::wait_for;

fn poll() -> PollConfig {
    PollConfig::new(Duration::from_millis(100), Duration::from_secs(5))
}

#[tokio::test(start_paused = true)]
async fn satisfied_predicate_returns_without_sleeping() {
    let started = Instant::now();
    let calls = AtomicU32::new(0);
    let observed = wait_for(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, ClientError>(42_u32) }
        },
        |state: Option<&u32>| state.is_some(),
        &poll(),
    )
    .await
    .expect("wait should succeed");
    assert_eq!(observed, Some(42));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn repeated_wait_after_success_is_idempotent() {
    for _ in 0..2 {
        let started = Instant::now();
        let observed = wait_for(
            || async { Ok::<_, ClientError>("ready") },
            |state: Option<&&str>| state.is_some(),
            &poll(),
        )
        .await
        .expect("wait should succeed");
        assert_eq!(observed, Some("ready"));
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_error_carries_last_observed_state() {
    let err = wait_for(
        || async { Ok::<_, ClientError>("still-pending") },
        |_: Option<&&str>| false,
        &poll(),
    )
    .await
    .expect_err("wait should time out");
    match err {
        WaitError::DeadlineExceeded {
            waited,
            attempts,
            last_observed,
        } => {
            assert!(waited >= Duration::from_secs(5));
            assert!(attempts > 1);
            assert!(!last_observed.is_empty());
            assert!(last_observed.contains("still-pending"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn deadline_with_nothing_observed_reports_absence() {
    let err = wait_for(
        || async { Err::<u32, _>(ClientError::not_found("runs", "ns", "missing")) },
        |state: Option<&u32>| state.is_some(),
        &poll(),
    )
    .await
    .expect_err("wait should time out");
    match err {
        WaitError::DeadlineExceeded {
            last_observed, ..
        } => assert_eq!(last_observed, "<absent>"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn transient_faults_are_retried_within_the_deadline() {
    let calls = AtomicU32::new(0);
    let observed = wait_for(
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(ClientError::Transient {
                        detail: "blip".to_string(),
                    })
                } else {
                    Ok(7_u32)
                }
            }
        },
        |state: Option<&u32>| state.is_some(),
        &poll(),
    )
    .await
    .expect("wait should ride out transient faults");
    assert_eq!(observed, Some(7));
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn transient_fault_does_not_satisfy_an_absence_predicate() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();
    let observed = wait_for(
        || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(ClientError::Transient {
                        detail: "blip".to_string(),
                    })
                } else {
                    Err(ClientError::not_found("virtualmachines", "ns", "vm-1"))
                }
            }
        },
        |state: Option<&u32>| state.is_none(),
        &poll(),
    )
    .await
    .expect("absence should be observed on the second tick");
    assert_eq!(observed, None);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // One sleep between the inconclusive tick and the real observation.
    assert_eq!(started.elapsed(), Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn non_retryable_errors_abort_the_wait() {
    let err = wait_for(
        || async {
            Err::<u32, _>(ClientError::Api {
                status: 403,
                message: "forbidden".to_string(),
            })
        },
        |state: Option<&u32>| state.is_some(),
        &poll(),
    )
    .await
    .expect_err("wait should abort");
    assert!(matches!(err, WaitError::Client(ClientError::Api { status: 403, .. })));
}

#[tokio::test(start_paused = true)]
async fn confirm_never_checks_once_at_the_deadline() {
    let calls = AtomicU32::new(0);
    let started = Instant::now();
    confirm_never(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<u32, _>(ClientError::not_found("virtualmachines", "ns", "vm-1")) }
        },
        |state: Option<&u32>| state.is_some(),
        Duration::from_secs(3),
        Duration::from_millis(100),
    )
    .await
    .expect("absent resource passes the negative check");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn confirm_never_surfaces_a_persistent_transient_fault() {
    let calls = AtomicU32::new(0);
    let err = confirm_never(
        || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<u32, _>(ClientError::Transient {
                    detail: "connection reset".to_string(),
                })
            }
        },
        |state: Option<&u32>| state.is_some(),
        Duration::from_secs(1),
        Duration::from_millis(100),
    )
    .await
    .expect_err("retry budget should run out");
    // Initial check plus three retries.
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    match err {
        WaitError::Client(inner) => assert!(inner.is_transient()),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test(start_paused = true)]
async fn confirm_never_reports_a_reached_condition() {
    let err = confirm_never(
        || async { Ok::<_, ClientError>("running") },
        |state: Option<&&str>| state.is_some(),
        Duration::from_secs(1),
        Duration::from_millis(100),
    )
    .await
    .expect_err("present resource fails the negative check");
    match err {
        WaitError::ConditionReached {
            observed,
        } => assert!(observed.contains("running")),
        other => panic!("unexpected error: {other}"),
    }
}
