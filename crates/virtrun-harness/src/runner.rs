// crates/virtrun-harness/src/runner.rs
// ============================================================================
// Module: Run Submitter
// Description: Creates runs, tracks terminal state, retrieves logs/results.
// Purpose: Own the work-item half of a scenario's lifecycle.
// Dependencies: crate::{registry, waiter}, virtrun-api, tracing
// ============================================================================

//! ## Overview
//! [`RunSubmitter::submit`] creates the run and registers it for cleanup in
//! the same breath; creation failure (admission rejection) is terminal and
//! never retried. Completion is a convergence wait on "phase is terminal".
//! Logs and results may only be fetched once a terminal phase has been
//! observed; asking earlier is a programming error and fails fast.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use tracing::debug;
use tracing::info;
use virtrun_api::Cluster;
use virtrun_api::Run;
use virtrun_api::RunPhase;

use crate::error::HarnessError;
use crate::registry::ManagedSet;
use crate::waiter::PollConfig;
use crate::waiter::WaitError;
use crate::waiter::wait_for;

// ============================================================================
// SECTION: Handles and Outcomes
// ============================================================================

/// Handle to a submitted run.
///
/// # Invariants
/// - `terminal` is set exactly once, by [`RunSubmitter::await_completion`].
#[derive(Debug, Clone)]
pub struct RunHandle {
    /// Namespace the run lives in.
    pub namespace: String,
    /// Name of the run.
    pub name: String,
    terminal: Option<RunPhase>,
}

impl RunHandle {
    /// Returns the terminal phase once completion has been observed.
    #[must_use]
    pub const fn terminal_phase(&self) -> Option<RunPhase> {
        self.terminal
    }

    fn qualified_name(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }
}

/// Observed outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Terminal phase.
    pub phase: RunPhase,
    /// Failure message, when the cluster reported one.
    pub message: Option<String>,
    /// Captured log text.
    pub logs: String,
    /// Structured results emitted by the task.
    pub results: BTreeMap<String, String>,
}

impl RunOutcome {
    /// True when the run succeeded.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.phase == RunPhase::Succeeded
    }

    /// Builds the outcome for a run whose creation was rejected.
    ///
    /// The rejection reason doubles as the log text so log expectations can
    /// match admission errors the same way they match task output.
    #[must_use]
    pub fn rejected(reason: &str) -> Self {
        Self {
            phase: RunPhase::Failed,
            message: Some(reason.to_string()),
            logs: reason.to_string(),
            results: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Submitter
// ============================================================================

/// Submits runs and observes their completion.
pub struct RunSubmitter<'c> {
    cluster: &'c dyn Cluster,
    poll: PollConfig,
}

impl<'c> RunSubmitter<'c> {
    /// Creates a submitter polling with the given configuration.
    #[must_use]
    pub const fn new(cluster: &'c dyn Cluster, poll: PollConfig) -> Self {
        Self {
            cluster,
            poll,
        }
    }

    /// Creates the run on the cluster and registers it for cleanup.
    ///
    /// The reference is registered even when admission rejects the create:
    /// cleanup treats not-found as already-gone, and a rejected run must not
    /// escape teardown if the cluster half-created it.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Submit`] on any creation failure; submission
    /// is never retried.
    pub async fn submit(
        &self,
        run: &Run,
        registry: &mut ManagedSet,
    ) -> Result<RunHandle, HarnessError> {
        match self.cluster.runs().create(run).await {
            Ok(created) => {
                registry.register(created.object_ref());
                info!(run = %created.object_ref(), "submitted run");
                Ok(RunHandle {
                    namespace: created.meta.namespace,
                    name: created.meta.name,
                    terminal: None,
                })
            }
            Err(err) => {
                registry.register(run.object_ref());
                Err(HarnessError::Submit(err))
            }
        }
    }

    /// Waits until the run reaches a terminal phase, then gathers logs and
    /// results into a [`RunOutcome`].
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::RunDeadline`] with the last observed phase and
    /// any partial logs when the deadline elapses.
    pub async fn await_completion(
        &self,
        handle: &mut RunHandle,
        timeout: Duration,
    ) -> Result<RunOutcome, HarnessError> {
        let poll = self.poll.with_timeout(timeout);
        let runs = self.cluster.runs();
        let observed = wait_for(
            || {
                let namespace = handle.namespace.clone();
                let name = handle.name.clone();
                async move { runs.get(&namespace, &name).await }
            },
            |run: Option<&Run>| run.is_some_and(|run| run.status.phase.is_terminal()),
            &poll,
        )
        .await;

        match observed {
            Ok(Some(run)) => {
                handle.terminal = Some(run.status.phase);
                debug!(run = %handle.qualified_name(), phase = %run.status.phase, "run completed");
                let logs = self.fetch_logs(handle).await?;
                Ok(RunOutcome {
                    phase: run.status.phase,
                    message: run.status.message,
                    logs,
                    results: run.status.results,
                })
            }
            // The terminal predicate rejects absence, so Ok(None) is
            // unreachable; treat it like a deadline with nothing observed.
            Ok(None) => Err(HarnessError::RunDeadline {
                run: handle.qualified_name(),
                timeout,
                last_phase: "<absent>".to_string(),
                partial_logs: String::new(),
            }),
            Err(WaitError::DeadlineExceeded {
                last_observed, ..
            }) => {
                let partial_logs = self
                    .cluster
                    .run_logs(&handle.namespace, &handle.name)
                    .await
                    .unwrap_or_default();
                Err(HarnessError::RunDeadline {
                    run: handle.qualified_name(),
                    timeout,
                    last_phase: last_observed,
                    partial_logs,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Fetches the captured log text of a completed run.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Precondition`] when called before a terminal
    /// phase has been observed.
    pub async fn fetch_logs(&self, handle: &RunHandle) -> Result<String, HarnessError> {
        self.require_terminal(handle, "fetch_logs")?;
        Ok(self.cluster.run_logs(&handle.namespace, &handle.name).await?)
    }

    /// Fetches the structured results of a completed run.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Precondition`] when called before a terminal
    /// phase has been observed.
    pub async fn fetch_results(
        &self,
        handle: &RunHandle,
    ) -> Result<BTreeMap<String, String>, HarnessError> {
        self.require_terminal(handle, "fetch_results")?;
        let run = self.cluster.runs().get(&handle.namespace, &handle.name).await?;
        Ok(run.status.results)
    }

    fn require_terminal(&self, handle: &RunHandle, operation: &str) -> Result<(), HarnessError> {
        if handle.terminal.is_none() {
            return Err(HarnessError::Precondition(format!(
                "{operation} called before run {} reached a terminal phase",
                handle.qualified_name()
            )));
        }
        Ok(())
    }
}
