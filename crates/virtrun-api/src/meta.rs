// crates/virtrun-api/src/meta.rs
// ============================================================================
// Module: Resource Metadata
// Description: Resource kinds, object metadata, references, and selectors.
// Purpose: Provide the identity vocabulary shared by all facade operations.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every cluster object carries an [`ObjectMeta`]; every object is addressed
//! by an [`ObjectRef`]. References are the unit the harness registers for
//! cleanup, so they must stay cheap to clone and order-stable.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Resource Kinds
// ============================================================================

/// Resource kinds known to the facade.
///
/// # Invariants
/// - Variants are stable for serialization and cleanup dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// A submitted unit of work (the TaskRun analog).
    Run,
    /// A virtual machine managed by the cluster.
    VirtualMachine,
}

impl ResourceKind {
    /// Returns the plural path segment used by the REST API.
    #[must_use]
    pub const fn plural(self) -> &'static str {
        match self {
            Self::Run => "runs",
            Self::VirtualMachine => "virtualmachines",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

// ============================================================================
// SECTION: Object Metadata
// ============================================================================

/// Metadata common to all cluster objects.
///
/// # Invariants
/// - `name` and `namespace` are non-empty once the object exists on the
///   cluster; the server fills them on admission when omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    /// Object name, unique within its namespace and kind.
    pub name: String,
    /// Namespace the object lives in.
    pub namespace: String,
    /// Free-form labels.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Creates metadata with the given name and namespace.
    #[must_use]
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels: BTreeMap::new(),
        }
    }
}

// ============================================================================
// SECTION: Object References
// ============================================================================

/// A (kind, namespace, name) reference to a cluster object.
///
/// # Invariants
/// - References identify objects without holding their state; two refs are
///   equal exactly when they address the same object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Resource kind.
    pub kind: ResourceKind,
    /// Namespace of the object.
    pub namespace: String,
    /// Name of the object.
    pub name: String,
}

impl ObjectRef {
    /// Creates a reference to an object of the given kind.
    #[must_use]
    pub fn new(kind: ResourceKind, namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

// ============================================================================
// SECTION: Selectors
// ============================================================================

/// Label selector for list and watch operations.
///
/// An empty selector matches every object in the namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selector {
    /// Labels that must all be present with equal values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl Selector {
    /// Returns a selector matching everything.
    #[must_use]
    pub fn everything() -> Self {
        Self::default()
    }

    /// Returns true when the given labels satisfy the selector.
    #[must_use]
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels.iter().all(|(key, value)| labels.get(key) == Some(value))
    }
}
