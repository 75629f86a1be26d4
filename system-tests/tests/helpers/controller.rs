// system-tests/tests/helpers/controller.rs
// ============================================================================
// Module: Scripted Task Controller
// Description: In-process controller that executes create-vm runs.
// Purpose: Give scenarios a cluster that reacts the way the real one does.
// Dependencies: virtrun-api, tokio, tokio-stream, tracing
// ============================================================================

//! ## Overview
//! The controller watches a namespace for newly created runs and executes the
//! `create-vm` task against the same in-memory cluster: it validates
//! parameters, creates the requested virtual machine, advances guest phases
//! according to the run strategy, and writes logs and results back onto the
//! run. Failures become a terminal `Failed` phase with the reason in both the
//! status message and the log, matching how scenarios observe the real thing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_stream::StreamExt;
use tracing::debug;
use tracing::warn;
use virtrun_api::Cluster;
use virtrun_api::ResourceOps;
use virtrun_api::Run;
use virtrun_api::RunPhase;
use virtrun_api::RunStrategy;
use virtrun_api::Selector;
use virtrun_api::VirtualMachine;
use virtrun_api::VmPhase;
use virtrun_api::WatchEvent;
use virtrun_api::fake::FakeCluster;

// ============================================================================
// SECTION: Task Vocabulary
// ============================================================================

/// The only task this controller executes.
pub const CREATE_VM_TASK: &str = "create-vm";

/// Rejection text when both manifest sources are given.
pub const CONFLICTING_SOURCES: &str =
    "only one of vm-manifest or template-name should be specified";

/// Rejection text when no manifest source is given.
pub const MISSING_SOURCE: &str = "one of vm-manifest or template-name should be specified";

/// Namespaces the controller refuses to create resources in.
const FORBIDDEN_NAMESPACES: [&str; 2] = ["kube-system", "virtrun-system"];

/// Parameters the create-vm task understands.
const KNOWN_PARAMS: [&str; 5] =
    ["vm-manifest", "template-name", "vm-namespace", "start-vm", "run-strategy"];

// ============================================================================
// SECTION: Controller
// ============================================================================

/// Handle to the spawned controller task; aborts on drop.
pub struct TaskController {
    join: JoinHandle<()>,
}

impl TaskController {
    /// Starts a controller serving runs created in `namespace`.
    ///
    /// The watch is established before this returns, so runs submitted
    /// afterwards are guaranteed to be seen.
    pub async fn spawn(cluster: &FakeCluster, namespace: &str) -> Self {
        let watch = cluster
            .runs()
            .watch(namespace, &Selector::everything())
            .await
            .unwrap_or_else(|err| panic!("controller watch failed: {err}"));
        let cluster = cluster.clone();
        let join = tokio::spawn(async move {
            let mut watch = watch;
            while let Some(item) = watch.next().await {
                match item {
                    Ok(WatchEvent::Added(run)) => {
                        let cluster = cluster.clone();
                        tokio::spawn(async move {
                            process(&cluster, run).await;
                        });
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "controller watch hiccup"),
                }
            }
        });
        Self {
            join,
        }
    }
}

impl Drop for TaskController {
    fn drop(&mut self) {
        self.join.abort();
    }
}

// ============================================================================
// SECTION: Task Execution
// ============================================================================

/// Executes one run to a terminal phase.
async fn process(cluster: &FakeCluster, run: Run) {
    let namespace = run.meta.namespace.clone();
    let name = run.meta.name.clone();
    debug!(run = %format!("{namespace}/{name}"), "controller picked up run");

    if cluster
        .update_run(&namespace, &name, |r| r.status.phase = RunPhase::Running)
        .is_err()
    {
        // Deleted before we got to it.
        return;
    }
    cluster.append_run_log(&namespace, &name, "processing create-vm request\n");
    sleep(Duration::from_millis(10)).await;

    let outcome = if run.spec.task == CREATE_VM_TASK {
        execute_create_vm(cluster, &run).await
    } else {
        Err(format!("unknown task {:?}", run.spec.task))
    };

    match outcome {
        Ok(created) => {
            let vm_namespace = created.meta.namespace.clone();
            let vm_name = created.meta.name.clone();
            cluster.append_run_log(
                &namespace,
                &name,
                &format!("created virtual machine {vm_namespace}/{vm_name}\n"),
            );
            let _ = cluster.update_run(&namespace, &name, |r| {
                r.status.phase = RunPhase::Succeeded;
                r.status.results.insert("name".to_string(), vm_name.clone());
                r.status.results.insert("namespace".to_string(), vm_namespace.clone());
            });
        }
        Err(reason) => {
            cluster.append_run_log(&namespace, &name, &format!("{reason}\n"));
            let _ = cluster.update_run(&namespace, &name, |r| {
                r.status.phase = RunPhase::Failed;
                r.status.message = Some(reason.clone());
            });
        }
    }
}

/// Validates parameters, creates the VM, and advances the guest.
async fn execute_create_vm(
    cluster: &FakeCluster,
    run: &Run,
) -> Result<VirtualMachine, String> {
    let params = &run.spec.params;
    for key in params.keys() {
        if !KNOWN_PARAMS.contains(&key.as_str()) {
            return Err(format!("unknown flag: --{key}"));
        }
    }

    let manifest = match (params.get("vm-manifest"), params.get("template-name")) {
        (Some(_), Some(_)) => return Err(CONFLICTING_SOURCES.to_string()),
        (None, None) => return Err(MISSING_SOURCE.to_string()),
        (None, Some(template)) => return Err(format!("template {template:?} not found")),
        (Some(manifest), None) => manifest,
    };

    let mut vm = VirtualMachine::from_manifest(manifest)
        .map_err(|err| format!("could not read VM manifest: {err}"))?;

    // Namespace precedence: explicit param, then manifest, then run namespace.
    let namespace = params
        .get("vm-namespace")
        .cloned()
        .or_else(|| (!vm.meta.namespace.is_empty()).then(|| vm.meta.namespace.clone()))
        .unwrap_or_else(|| run.meta.namespace.clone());
    if FORBIDDEN_NAMESPACES.contains(&namespace.as_str()) {
        return Err(format!(
            "cannot create resource \"virtualmachines\" in namespace {namespace:?}"
        ));
    }
    vm.meta.namespace = namespace;

    if let Some(raw) = params.get("run-strategy") {
        vm.spec.run_strategy = parse_run_strategy(raw)?;
    }
    match params.get("start-vm").map(String::as_str) {
        Some("true") => vm.spec.run_strategy = RunStrategy::Always,
        None | Some("false") => {}
        Some(other) => return Err(format!("invalid start-vm value {other:?}")),
    }

    let created =
        cluster.vms().create(&vm).await.map_err(|err| err.to_string())?;
    advance_guest(cluster, &created).await;
    Ok(created)
}

/// Drives the guest to the state its run strategy implies.
async fn advance_guest(cluster: &FakeCluster, vm: &VirtualMachine) {
    let namespace = vm.meta.namespace.as_str();
    let name = vm.meta.name.as_str();
    if vm.spec.run_strategy == RunStrategy::Always {
        let _ = cluster.update_vm(namespace, name, |vm| {
            vm.status.phase = VmPhase::Starting;
        });
        sleep(Duration::from_millis(10)).await;
        let _ = cluster.update_vm(namespace, name, |vm| {
            vm.status.phase = VmPhase::Running;
            vm.status.ready = true;
        });
    } else {
        let _ = cluster.update_vm(namespace, name, |vm| {
            vm.status.phase = VmPhase::Stopped;
        });
    }
}

fn parse_run_strategy(raw: &str) -> Result<RunStrategy, String> {
    match raw {
        "Always" => Ok(RunStrategy::Always),
        "Halted" => Ok(RunStrategy::Halted),
        "Manual" => Ok(RunStrategy::Manual),
        "RerunOnFailure" => Ok(RunStrategy::RerunOnFailure),
        other => Err(format!("invalid run strategy {other:?}")),
    }
}
