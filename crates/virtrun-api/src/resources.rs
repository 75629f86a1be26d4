// crates/virtrun-api/src/resources.rs
// ============================================================================
// Module: Cluster Resources
// Description: Run and VirtualMachine resource types with their lifecycles.
// Purpose: Model the objects the harness submits, observes, and cleans up.
// Dependencies: crate::meta, serde, serde_yaml
// ============================================================================

//! ## Overview
//! Two resource kinds matter to the harness: a [`Run`] is the submitted unit
//! of work, a [`VirtualMachine`] is the downstream object whose emergent
//! state scenarios verify. Both are plain serde types; the cluster owns their
//! state and the harness only reads it back.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::meta::ObjectMeta;
use crate::meta::ObjectRef;
use crate::meta::ResourceKind;

// ============================================================================
// SECTION: Run Lifecycle
// ============================================================================

/// Lifecycle phase of a run.
///
/// # Invariants
/// - Observed phases advance monotonically: `Pending` → `Running` →
///   {`Succeeded`, `Failed`}; no phase is revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    /// Accepted but not started.
    Pending,
    /// Executing.
    Running,
    /// Terminal: completed successfully.
    Succeeded,
    /// Terminal: completed with an error.
    Failed,
}

impl RunPhase {
    /// Returns true for `Succeeded` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Succeeded => "Succeeded",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

// ============================================================================
// SECTION: Run Resource
// ============================================================================

/// Declared parameters of a run.
///
/// # Invariants
/// - `params` is interpreted by the task, not by the facade.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSpec {
    /// Task to execute.
    pub task: String,
    /// Service identity the task executes under.
    pub service_account: String,
    /// Task parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

/// Observed status of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Current phase.
    pub phase: RunPhase,
    /// Optional status message (populated on failure).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Structured results emitted by the task.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub results: BTreeMap<String, String>,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self {
            phase: RunPhase::Pending,
            message: None,
            results: BTreeMap::new(),
        }
    }
}

/// A submitted unit of work.
///
/// # Invariants
/// - `status` is owned by the cluster and mutated only through polling reads;
///   the harness never writes it back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Run {
    /// Object metadata.
    pub meta: ObjectMeta,
    /// Declared parameters.
    pub spec: RunSpec,
    /// Observed status.
    #[serde(default)]
    pub status: RunStatus,
}

impl Run {
    /// Returns a cleanup reference to this run.
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceKind::Run, &self.meta.namespace, &self.meta.name)
    }
}

// ============================================================================
// SECTION: Virtual Machine Lifecycle
// ============================================================================

/// Lifecycle phase of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmPhase {
    /// Object admitted, nothing scheduled yet.
    Pending,
    /// Backing resources being provisioned.
    Provisioning,
    /// Guest starting.
    Starting,
    /// Guest running.
    Running,
    /// Guest intentionally stopped.
    Stopped,
    /// Guest failed.
    Failed,
}

impl fmt::Display for VmPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pending => "Pending",
            Self::Provisioning => "Provisioning",
            Self::Starting => "Starting",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Failed => "Failed",
        };
        f.write_str(label)
    }
}

/// Run strategy declared on a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStrategy {
    /// Keep the guest running.
    Always,
    /// Keep the guest stopped.
    Halted,
    /// Start and stop only on explicit request.
    Manual,
    /// Restart the guest on failure.
    RerunOnFailure,
}

// ============================================================================
// SECTION: Virtual Machine Resource
// ============================================================================

/// Declared shape of a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmSpec {
    /// Declared run strategy.
    pub run_strategy: RunStrategy,
    /// Labels applied to the guest instance.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub instance_labels: BTreeMap<String, String>,
}

impl Default for VmSpec {
    fn default() -> Self {
        Self {
            run_strategy: RunStrategy::Halted,
            instance_labels: BTreeMap::new(),
        }
    }
}

/// Observed status of a virtual machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmStatus {
    /// Current phase.
    pub phase: VmPhase,
    /// True once the guest answers readiness probes.
    #[serde(default)]
    pub ready: bool,
}

impl Default for VmStatus {
    fn default() -> Self {
        Self {
            phase: VmPhase::Pending,
            ready: false,
        }
    }
}

/// A virtual machine managed by the cluster.
///
/// # Invariants
/// - Read-only from the harness's perspective; the cluster owns the status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualMachine {
    /// Object metadata.
    pub meta: ObjectMeta,
    /// Declared shape.
    pub spec: VmSpec,
    /// Observed status.
    #[serde(default)]
    pub status: VmStatus,
}

impl VirtualMachine {
    /// Parses a VM from a YAML manifest.
    ///
    /// # Errors
    ///
    /// Returns the underlying YAML error when the manifest does not describe
    /// a well-formed virtual machine.
    pub fn from_manifest(manifest: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(manifest)
    }

    /// Serializes the VM into a YAML manifest.
    ///
    /// # Errors
    ///
    /// Returns the underlying YAML error; only unrepresentable values fail.
    pub fn to_manifest(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Returns a cleanup reference to this VM.
    #[must_use]
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef::new(ResourceKind::VirtualMachine, &self.meta.namespace, &self.meta.name)
    }
}
