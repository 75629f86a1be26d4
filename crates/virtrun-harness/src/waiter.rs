// crates/virtrun-harness/src/waiter.rs
// ============================================================================
// Module: Convergence Waiter
// Description: Generic polling engine with hard deadlines.
// Purpose: Block until a predicate over observed state holds or time runs out.
// Dependencies: virtrun-api, tokio, tracing
// ============================================================================

//! ## Overview
//! [`wait_for`] fetches and checks the predicate before it ever sleeps, so a
//! predicate that already holds returns immediately. The predicate sees `Option<&T>` because absence is an observable
//! state: some scenarios assert that a resource is never created. Transient
//! fetch faults are retried on the next tick within the same deadline;
//! not-found reads observe `None`; every other client error aborts the wait.
//!
//! This loop is the harness's only suspension point and the only place a
//! deadline is enforced. On expiry the error carries a rendering of the last
//! observed state and the attempt count.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;
use tokio::time::sleep;
use tracing::debug;
use virtrun_api::ClientError;
use virtrun_api::ClusterObject;
use virtrun_api::ResourceOps;

// ============================================================================
// SECTION: Poll Configuration
// ============================================================================

/// Poll interval and deadline for one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay between consecutive fetches.
    pub interval: Duration,
    /// Hard deadline for the whole wait.
    pub timeout: Duration,
}

impl PollConfig {
    /// Creates a poll configuration.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
        }
    }

    /// Returns this configuration with a different deadline.
    #[must_use]
    pub const fn with_timeout(self, timeout: Duration) -> Self {
        Self {
            timeout,
            ..self
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            timeout: Duration::from_secs(120),
        }
    }
}

// ============================================================================
// SECTION: Wait Errors
// ============================================================================

/// Errors produced by the waiter.
#[derive(Debug, Error)]
pub enum WaitError {
    /// The deadline elapsed before the predicate held.
    ///
    /// `last_observed` is never empty; when nothing was ever fetched it reads
    /// `<absent>`.
    #[error(
        "deadline exceeded after {waited:?} ({attempts} polls); last observed: {last_observed}"
    )]
    DeadlineExceeded {
        /// Time actually spent waiting.
        waited: Duration,
        /// Number of fetch attempts made.
        attempts: u32,
        /// Rendering of the last observed state.
        last_observed: String,
    },

    /// The predicate of a negative check unexpectedly held.
    #[error("condition unexpectedly reached: {observed}")]
    ConditionReached {
        /// Rendering of the offending state.
        observed: String,
    },

    /// A non-retryable client error aborted the wait.
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Renders the last observation for diagnostics.
fn render_observation<T: fmt::Debug>(observed: Option<&T>) -> String {
    observed.map_or_else(|| "<absent>".to_string(), |state| format!("{state:?}"))
}

// ============================================================================
// SECTION: Wait Loop
// ============================================================================

/// Polls `fetch` until `predicate` holds over the observation or `poll`'s
/// deadline elapses.
///
/// Returns the observation that satisfied the predicate (`None` when the
/// predicate accepted absence). Calling again after success with the same
/// arguments returns on the first fetch.
///
/// # Errors
///
/// Returns [`WaitError::DeadlineExceeded`] with the last observed state when
/// the deadline elapses, or [`WaitError::Client`] when a fetch fails with a
/// non-transient error other than not-found.
pub async fn wait_for<T, F, Fut, P>(
    mut fetch: F,
    predicate: P,
    poll: &PollConfig,
) -> Result<Option<T>, WaitError>
where
    T: fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
    P: Fn(Option<&T>) -> bool,
{
    let started = Instant::now();
    let mut attempts = 0_u32;
    let mut last: Option<T> = None;
    loop {
        attempts = attempts.saturating_add(1);
        // A transient fault leaves the previous observation in place and
        // skips the predicate for this tick: the state is unknown, and an
        // absence predicate must not fire on a network hiccup.
        let mut observation_valid = true;
        match fetch().await {
            Ok(state) => last = Some(state),
            Err(err) if err.is_not_found() => last = None,
            Err(err) if err.is_transient() => {
                debug!(attempt = attempts, error = %err, "transient fetch fault, retrying");
                observation_valid = false;
            }
            Err(err) => return Err(WaitError::Client(err)),
        }
        if observation_valid && predicate(last.as_ref()) {
            return Ok(last);
        }
        let waited = started.elapsed();
        if waited >= poll.timeout {
            return Err(WaitError::DeadlineExceeded {
                waited,
                attempts,
                last_observed: render_observation(last.as_ref()),
            });
        }
        sleep(poll.interval).await;
    }
}

/// Waits for a named resource to satisfy a predicate.
///
/// Convenience wrapper over [`wait_for`] that polls `ops.get`.
///
/// # Errors
///
/// Same contract as [`wait_for`].
pub async fn wait_for_resource<T, P>(
    ops: &dyn ResourceOps<T>,
    namespace: &str,
    name: &str,
    predicate: P,
    poll: &PollConfig,
) -> Result<Option<T>, WaitError>
where
    T: ClusterObject + fmt::Debug,
    P: Fn(Option<&T>) -> bool,
{
    wait_for(
        || {
            let namespace = namespace.to_string();
            let name = name.to_string();
            async move { ops.get(&namespace, &name).await }
        },
        predicate,
        poll,
    )
    .await
}

// ============================================================================
// SECTION: Negative Checks
// ============================================================================

/// Confirms that a predicate does NOT hold at the end of the window.
///
/// "Never happens" cannot be proven by polling within finite time, so this is
/// a single bounded-time check at the deadline, not a formal guarantee: the
/// whole window is slept through, the resource is fetched once, and the
/// predicate must not hold. A transition after the check is missed by
/// construction.
///
/// # Errors
///
/// Returns [`WaitError::ConditionReached`] when the predicate holds at the
/// check, or [`WaitError::Client`] when the final fetch fails with a
/// non-retryable error, or is still failing transiently after the short
/// retry budget is spent (the carried error is the transient one).
pub async fn confirm_never<T, F, Fut, P>(
    mut fetch: F,
    predicate: P,
    window: Duration,
    retry_interval: Duration,
) -> Result<(), WaitError>
where
    T: fmt::Debug,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ClientError>>,
    P: Fn(Option<&T>) -> bool,
{
    sleep(window).await;
    // The single check tolerates a short burst of transient faults.
    let mut remaining_retries = 3_u32;
    loop {
        let observed = match fetch().await {
            Ok(state) => Some(state),
            Err(err) if err.is_not_found() => None,
            Err(err) if err.is_transient() && remaining_retries > 0 => {
                remaining_retries -= 1;
                sleep(retry_interval).await;
                continue;
            }
            Err(err) => return Err(WaitError::Client(err)),
        };
        if predicate(observed.as_ref()) {
            return Err(WaitError::ConditionReached {
                observed: render_observation(observed.as_ref()),
            });
        }
        return Ok(());
    }
}
