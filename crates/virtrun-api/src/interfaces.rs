// crates/virtrun-api/src/interfaces.rs
// ============================================================================
// Module: Facade Interfaces
// Description: Backend-agnostic CRUD/watch traits over cluster resources.
// Purpose: Define the contract surface the harness consumes.
// Dependencies: crate::{error, meta, resources}, async-trait, tokio-stream
// ============================================================================

//! ## Overview
//! The harness depends on these traits only. [`ResourceOps`] is the per-kind
//! operation set; [`Cluster`] bundles the typed accessors plus the two calls
//! that do not fit the per-kind shape (log retrieval, kind-dispatched
//! deletion). Implementations must map their transport faults onto the
//! [`ClientError`] taxonomy so the waiter can classify them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::pin::Pin;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio_stream::Stream;

use crate::error::ClientError;
use crate::meta::ObjectMeta;
use crate::meta::ObjectRef;
use crate::meta::ResourceKind;
use crate::meta::Selector;
use crate::resources::Run;
use crate::resources::VirtualMachine;

// ============================================================================
// SECTION: Cluster Objects
// ============================================================================

/// Implemented by every resource type the facade can address.
pub trait ClusterObject: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Kind of this resource type.
    const KIND: ResourceKind;

    /// Returns the object metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Returns the object metadata for mutation.
    fn meta_mut(&mut self) -> &mut ObjectMeta;
}

impl ClusterObject for Run {
    const KIND: ResourceKind = ResourceKind::Run;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

impl ClusterObject for VirtualMachine {
    const KIND: ResourceKind = ResourceKind::VirtualMachine;

    fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.meta
    }
}

// ============================================================================
// SECTION: Patch Types
// ============================================================================

/// Supported patch encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchType {
    /// RFC 7386 merge patch.
    Merge,
    /// RFC 6902 JSON patch.
    Json,
}

/// A patch request body with its encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// Patch encoding.
    pub patch_type: PatchType,
    /// Patch document.
    pub body: serde_json::Value,
}

// ============================================================================
// SECTION: Watch Events
// ============================================================================

/// One event on a watch stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "object")]
pub enum WatchEvent<T> {
    /// Object created.
    Added(T),
    /// Object updated.
    Modified(T),
    /// Object deleted; carries the last known state.
    Deleted(T),
}

/// Boxed stream of watch events.
pub type WatchStream<T> =
    Pin<Box<dyn Stream<Item = Result<WatchEvent<T>, ClientError>> + Send>>;

// ============================================================================
// SECTION: Resource Operations
// ============================================================================

/// Typed CRUD and watch operations for one resource kind.
#[async_trait]
pub trait ResourceOps<T: Send + Sync + 'static>: Send + Sync {
    /// Fetches a single object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the object does not exist and
    /// [`ClientError::Transient`] for retryable faults.
    async fn get(&self, namespace: &str, name: &str) -> Result<T, ClientError>;

    /// Lists objects matching the selector.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the list call fails.
    async fn list(&self, namespace: &str, selector: &Selector) -> Result<Vec<T>, ClientError>;

    /// Opens a watch stream for objects matching the selector.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the stream cannot be established.
    async fn watch(
        &self,
        namespace: &str,
        selector: &Selector,
    ) -> Result<WatchStream<T>, ClientError>;

    /// Creates an object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::AdmissionRejected`] when the cluster refuses
    /// the object and [`ClientError::Conflict`] when the name is taken.
    async fn create(&self, object: &T) -> Result<T, ClientError>;

    /// Replaces an existing object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Conflict`] on concurrent modification.
    async fn update(&self, object: &T) -> Result<T, ClientError>;

    /// Deletes an object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the object is already gone.
    async fn delete(&self, namespace: &str, name: &str) -> Result<(), ClientError>;

    /// Applies a patch and returns the updated object.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] when the patch is rejected.
    async fn patch(&self, namespace: &str, name: &str, patch: &Patch) -> Result<T, ClientError>;
}

// ============================================================================
// SECTION: Cluster Facade
// ============================================================================

/// Bundle of typed operations plus cross-kind calls.
#[async_trait]
pub trait Cluster: Send + Sync {
    /// Operations on runs.
    fn runs(&self) -> &dyn ResourceOps<Run>;

    /// Operations on virtual machines.
    fn vms(&self) -> &dyn ResourceOps<VirtualMachine>;

    /// Fetches the captured log text of a run.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::NotFound`] when the run does not exist.
    async fn run_logs(&self, namespace: &str, name: &str) -> Result<String, ClientError>;

    /// Deletes the object addressed by the reference, dispatching on kind.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError`] from the underlying typed delete.
    async fn delete(&self, record: &ObjectRef) -> Result<(), ClientError> {
        match record.kind {
            ResourceKind::Run => self.runs().delete(&record.namespace, &record.name).await,
            ResourceKind::VirtualMachine => {
                self.vms().delete(&record.namespace, &record.name).await
            }
        }
    }
}
