// crates/virtrun-harness/src/registry.rs
// ============================================================================
// Module: Managed Resource Registry
// Description: Records created resources and guarantees their deletion.
// Purpose: Tear down everything a scenario provisioned, pass or fail.
// Dependencies: virtrun-api, tracing
// ============================================================================

//! ## Overview
//! Every resource a scenario provisions is registered the moment it is known
//! to exist and deleted at scenario end in reverse registration order
//! (dependents before dependencies). Cleanup collects every deletion error
//! instead of stopping at the first, drains the records it processed, and is
//! therefore idempotent: a second call deletes nothing and reports nothing.
//! The registry is scenario-local state, never shared across workers.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use tracing::debug;
use tracing::warn;
use virtrun_api::ClientError;
use virtrun_api::Cluster;
use virtrun_api::ObjectRef;

// ============================================================================
// SECTION: Cleanup Failures
// ============================================================================

/// One failed deletion during teardown.
#[derive(Debug, Clone)]
pub struct CleanupFailure {
    /// Record whose deletion failed.
    pub record: ObjectRef,
    /// The deletion error.
    pub error: ClientError,
}

impl fmt::Display for CleanupFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to delete {}: {}", self.record, self.error)
    }
}

// ============================================================================
// SECTION: Managed Set
// ============================================================================

/// Scenario-local set of resources owed a deletion.
#[derive(Debug, Default)]
pub struct ManagedSet {
    records: Vec<ObjectRef>,
}

impl ManagedSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource for deletion at scenario end.
    ///
    /// Call this the moment the resource is known to exist, never before.
    /// Re-registering an identical reference is a no-op so each object is
    /// submitted for deletion exactly once.
    pub fn register(&mut self, record: ObjectRef) {
        if self.records.contains(&record) {
            return;
        }
        debug!(record = %record, "registered for cleanup");
        self.records.push(record);
    }

    /// Number of records currently owed a deletion.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing is owed a deletion.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records currently owed a deletion, in registration order.
    #[must_use]
    pub fn records(&self) -> &[ObjectRef] {
        &self.records
    }

    /// Deletes every registered record in reverse registration order.
    ///
    /// Errors are collected, not short-circuited; a record that is already
    /// gone counts as success. Processed records are drained, so calling
    /// again produces no additional deletions and no new errors.
    pub async fn cleanup(&mut self, cluster: &dyn Cluster) -> Vec<CleanupFailure> {
        let mut failures = Vec::new();
        while let Some(record) = self.records.pop() {
            match cluster.delete(&record).await {
                Ok(()) => debug!(record = %record, "deleted"),
                Err(err) if err.is_not_found() => {
                    debug!(record = %record, "already gone");
                }
                Err(err) => {
                    warn!(record = %record, error = %err, "cleanup deletion failed");
                    failures.push(CleanupFailure {
                        record,
                        error: err,
                    });
                }
            }
        }
        failures
    }
}
