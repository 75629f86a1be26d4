// crates/virtrun-api/src/error.rs
// ============================================================================
// Module: Client Errors
// Description: Error taxonomy for facade operations.
// Purpose: Let callers distinguish transient faults from terminal rejections.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! The harness retries [`ClientError::Transient`] within an existing
//! deadline, treats [`ClientError::NotFound`] as "not yet converged", and
//! surfaces everything else immediately. Variants are stable for programmatic
//! handling.

use thiserror::Error;

/// Errors returned by facade operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The addressed object does not exist.
    #[error("{kind}/{namespace}/{name} not found")]
    NotFound {
        /// Resource kind (plural form).
        kind: String,
        /// Namespace of the missing object.
        namespace: String,
        /// Name of the missing object.
        name: String,
    },

    /// A write conflicted with a concurrent update.
    #[error("conflict writing {name}: {message}")]
    Conflict {
        /// Name of the contested object.
        name: String,
        /// Server-provided conflict detail.
        message: String,
    },

    /// The cluster's admission layer rejected the object.
    #[error("admission rejected: {reason}")]
    AdmissionRejected {
        /// Rejection reason as reported by the admission layer.
        reason: String,
    },

    /// A transient fault (network hiccup, temporary unavailability).
    #[error("transient cluster error: {detail}")]
    Transient {
        /// Human-readable fault detail.
        detail: String,
    },

    /// Any other API error, carried with its status code.
    #[error("cluster API error (status {status}): {message}")]
    Api {
        /// HTTP-like status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },
}

impl ClientError {
    /// Builds a not-found error for the given coordinates.
    #[must_use]
    pub fn not_found(kind: &str, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind: kind.to_string(),
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    /// Returns true when the error means the object does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns true when retrying the same call later may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    /// Returns true when the admission layer rejected the request.
    #[must_use]
    pub const fn is_admission_rejected(&self) -> bool {
        matches!(self, Self::AdmissionRejected { .. })
    }
}
