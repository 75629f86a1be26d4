// crates/virtrun-harness/src/error.rs
// ============================================================================
// Module: Harness Errors
// Description: Error taxonomy for harness operations.
// Purpose: Separate retryable, terminal, and programming errors.
// Dependencies: virtrun-api, thiserror
// ============================================================================

//! ## Overview
//! Expectation mismatches are deliberately not errors; they aggregate into a
//! [`crate::expect::Verdict`]. Transient faults never surface either: the
//! waiter absorbs them inside its deadline. What remains here is terminal.

use std::time::Duration;

use thiserror::Error;
use virtrun_api::ClientError;

use crate::waiter::WaitError;

/// Errors returned by harness operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Run creation was rejected; terminal, never retried.
    #[error("failed to submit run: {0}")]
    Submit(ClientError),

    /// A non-retryable client failure outside submission.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A wait loop failed or exhausted its deadline.
    #[error(transparent)]
    Wait(#[from] WaitError),

    /// A run did not reach a terminal phase within its deadline.
    #[error(
        "run {run} did not complete within {timeout:?}: last phase {last_phase}; partial logs: {partial_logs:?}"
    )]
    RunDeadline {
        /// Namespace-qualified run name.
        run: String,
        /// Deadline that elapsed.
        timeout: Duration,
        /// Last phase observed before the deadline.
        last_phase: String,
        /// Whatever log text could be fetched after the deadline.
        partial_logs: String,
    },

    /// A caller broke an API precondition; fails fast, never retried.
    #[error("precondition violated: {0}")]
    Precondition(String),
}
