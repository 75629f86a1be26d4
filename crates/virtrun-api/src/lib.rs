// crates/virtrun-api/src/lib.rs
// ============================================================================
// Module: Virtrun API
// Description: Typed client facade for the virtrun cluster API.
// Purpose: Expose CRUD/watch operations and resource types to the harness.
// Dependencies: async-trait, reqwest, serde, tokio
// ============================================================================

//! ## Overview
//! Thin typed facade over the cluster's REST API. The harness consumes only
//! the traits in [`interfaces`]; backends are interchangeable. The generated
//! protocol details live behind [`http::HttpCluster`], and an in-memory
//! backend for tests and local development lives in [`fake::FakeCluster`].

pub mod error;
pub mod fake;
pub mod http;
pub mod interfaces;
pub mod meta;
pub mod resources;

pub use error::ClientError;
pub use interfaces::Cluster;
pub use interfaces::ClusterObject;
pub use interfaces::Patch;
pub use interfaces::PatchType;
pub use interfaces::ResourceOps;
pub use interfaces::WatchEvent;
pub use meta::ObjectMeta;
pub use meta::ObjectRef;
pub use meta::ResourceKind;
pub use meta::Selector;
pub use resources::Run;
pub use resources::RunPhase;
pub use resources::RunSpec;
pub use resources::RunStatus;
pub use resources::RunStrategy;
pub use resources::VirtualMachine;
pub use resources::VmPhase;
pub use resources::VmSpec;
pub use resources::VmStatus;
