// system-tests/tests/helpers/fixtures.rs
// ============================================================================
// Module: Scenario Fixtures
// Description: Manifest builders and shared scenario vocabulary.
// Purpose: Keep suite files declarative; all YAML assembly lives here.
// Dependencies: virtrun-api, virtrun-harness
// ============================================================================

use virtrun_api::ObjectMeta;
use virtrun_api::VirtualMachine;
use virtrun_harness::unique_name;

/// Builds a well-formed VM manifest with the given name and namespace.
///
/// An empty name asks the cluster to generate one on admission.
pub fn vm_manifest(name: &str, namespace: &str) -> String {
    let vm = VirtualMachine {
        meta: ObjectMeta::new(name, namespace),
        ..VirtualMachine::default()
    };
    vm.to_manifest().unwrap_or_else(|err| panic!("manifest fixture failed: {err}"))
}

/// Builds a well-formed manifest with a fresh unique name.
///
/// Returns the manifest and the generated name so the scenario can target it.
pub fn named_vm_manifest(prefix: &str, namespace: &str) -> (String, String) {
    let name = unique_name(prefix);
    (vm_manifest(&name, namespace), name)
}

/// A manifest the YAML parser rejects outright.
#[must_use]
pub fn invalid_vm_manifest() -> String {
    "this is { not: yaml, at all".to_string()
}

/// A structurally valid YAML document that is not a virtual machine.
#[must_use]
pub fn wrong_shape_manifest() -> String {
    "meta: 12\nspec: []\n".to_string()
}
