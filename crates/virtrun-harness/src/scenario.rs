// crates/virtrun-harness/src/scenario.rs
// ============================================================================
// Module: Scenario Runner
// Description: Declarative scenario configs and the generic scenario driver.
// Purpose: Collapse near-duplicate cases into one parameterized flow.
// Dependencies: crate::{expect, registry, runner, waiter}, virtrun-api, rand
// ============================================================================

//! ## Overview
//! A [`ScenarioConfig`] is an immutable description of one test: run
//! parameters, declared expectation, and an optional downstream target
//! assertion. [`run_scenario`] drives the sequential flow from submission
//! through evaluation to the target check, and always tears down what was
//! provisioned, whatever the verdict. Scenarios get unique generated names so
//! independent workers never interfere on the shared cluster.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Duration;

use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::time::sleep;
use tracing::info;
use virtrun_api::Cluster;
use virtrun_api::ObjectMeta;
use virtrun_api::ObjectRef;
use virtrun_api::ResourceKind;
use virtrun_api::Run;
use virtrun_api::RunSpec;
use virtrun_api::VirtualMachine;
use virtrun_api::VmPhase;

use crate::error::HarnessError;
use crate::expect::Expectation;
use crate::expect::Mismatch;
use crate::expect::Verdict;
use crate::expect::evaluate;
use crate::options::HarnessOptions;
use crate::registry::CleanupFailure;
use crate::registry::ManagedSet;
use crate::runner::RunOutcome;
use crate::runner::RunSubmitter;
use crate::waiter::WaitError;
use crate::waiter::confirm_never;
use crate::waiter::wait_for_resource;

// ============================================================================
// SECTION: Unique Names
// ============================================================================

/// Length of the random suffix appended to generated names.
const NAME_SUFFIX_LEN: usize = 6;

/// Generates a unique resource name from a human-readable prefix.
///
/// The prefix is lowered and squashed to `[a-z0-9-]`; a random suffix keeps
/// concurrently running scenarios from colliding on the shared cluster.
#[must_use]
pub fn unique_name(prefix: &str) -> String {
    let mut slug = String::with_capacity(prefix.len());
    let mut last_dash = true;
    for ch in prefix.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }
    let slug = slug.trim_end_matches('-');
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .filter(u8::is_ascii_lowercase)
        .take(NAME_SUFFIX_LEN)
        .map(char::from)
        .collect();
    if slug.is_empty() {
        format!("scenario-{suffix}")
    } else {
        format!("{slug}-{suffix}")
    }
}

// ============================================================================
// SECTION: Target Checks
// ============================================================================

/// How the downstream resource's name is determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetName {
    /// The name is known at scenario definition time.
    Explicit(String),
    /// The name is read from this run result key after completion.
    FromResult(String),
}

/// What the downstream resource must (or must not) do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetPolicy {
    /// The resource must exist within the window.
    MustExist,
    /// The resource must reach the phase within the window.
    MustReach(VmPhase),
    /// The resource must not exist when checked at the end of the window.
    MustNotExist,
    /// The resource must not be in the phase when checked at the end of the
    /// window.
    MustNotReach(VmPhase),
}

/// Second-order assertion over a downstream virtual machine.
///
/// Negative policies are checked once at the end of the window, not polled:
/// "never happens" cannot be proven by polling within finite time, so they
/// are best-effort bounded-time checks. `grace` guarantees a minimum elapsed
/// time before any assertion fires: positive polling starts after it, and a
/// negative window shorter than it is stretched to cover it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetCheck {
    /// Name of the downstream VM.
    pub name: TargetName,
    /// Namespace override; defaults to the scenario namespace.
    pub namespace: Option<String>,
    /// Assertion to apply.
    pub policy: TargetPolicy,
    /// Minimum elapsed time before the assertion fires.
    pub grace: Option<Duration>,
    /// Window override; defaults to the scenario timeout.
    pub timeout: Option<Duration>,
}

impl TargetCheck {
    /// Creates a check with defaults for namespace, grace, and window.
    #[must_use]
    pub fn new(name: TargetName, policy: TargetPolicy) -> Self {
        Self {
            name,
            namespace: None,
            policy,
            grace: None,
            timeout: None,
        }
    }
}

// ============================================================================
// SECTION: Scenario Configuration
// ============================================================================

/// Immutable description of one scenario.
///
/// # Invariants
/// - Never mutated after construction; the driver reads it only.
#[derive(Debug, Clone)]
pub struct ScenarioConfig {
    /// Human-readable scenario name; also the generated-name prefix.
    pub name: String,
    /// Optional skip tag matched against [`HarnessOptions::skip_tags`].
    pub tag: Option<String>,
    /// Task the run executes.
    pub task: String,
    /// Task parameters.
    pub params: BTreeMap<String, String>,
    /// Namespace override; defaults to the options' test namespace.
    pub namespace: Option<String>,
    /// Service identity override; defaults to the options' service account.
    pub service_account: Option<String>,
    /// Declared expectation.
    pub expectation: Expectation,
    /// Optional downstream assertion.
    pub target: Option<TargetCheck>,
    /// Run-completion deadline override.
    pub timeout: Option<Duration>,
}

impl ScenarioConfig {
    /// Creates a scenario with defaults for everything optional.
    #[must_use]
    pub fn new(name: impl Into<String>, task: impl Into<String>, expectation: Expectation) -> Self {
        Self {
            name: name.into(),
            tag: None,
            task: task.into(),
            params: BTreeMap::new(),
            namespace: None,
            service_account: None,
            expectation,
            target: None,
            timeout: None,
        }
    }

    /// Adds one task parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Sets the downstream assertion.
    #[must_use]
    pub fn with_target(mut self, target: TargetCheck) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the service identity.
    #[must_use]
    pub fn with_service_account(mut self, account: impl Into<String>) -> Self {
        self.service_account = Some(account.into());
        self
    }

    /// Sets the run-completion deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

// ============================================================================
// SECTION: Scenario Reports
// ============================================================================

/// Outcome of one scenario, rendered exactly once.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Scenario name.
    pub scenario: String,
    /// Aggregated verdict.
    pub verdict: Verdict,
    /// Teardown failures; reported alongside, never masking the verdict.
    pub cleanup_failures: Vec<CleanupFailure>,
    /// True when the scenario was skipped by tag.
    pub skipped: bool,
}

impl ScenarioReport {
    /// True when the verdict passed. Cleanup failures do not affect this.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.verdict.passed()
    }

    /// Renders the report for test output.
    #[must_use]
    pub fn render(&self) -> String {
        if self.skipped {
            return format!("{}: skipped", self.scenario);
        }
        let mut out = format!("{}: {}", self.scenario, self.verdict);
        for failure in &self.cleanup_failures {
            out.push_str(&format!("\n  cleanup: {failure}"));
        }
        out
    }
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// Runs one scenario end to end and tears down everything it provisioned.
///
/// The flow is strictly sequential: submit, await completion, evaluate,
/// target check, cleanup. Cleanup runs whatever happened before it.
pub async fn run_scenario(
    cluster: &dyn Cluster,
    options: &HarnessOptions,
    config: &ScenarioConfig,
) -> ScenarioReport {
    if let Some(tag) = &config.tag {
        if options.is_skipped(tag) {
            info!(scenario = %config.name, tag = %tag, "skipped by tag");
            return ScenarioReport {
                scenario: config.name.clone(),
                verdict: Verdict::pass(),
                cleanup_failures: Vec::new(),
                skipped: true,
            };
        }
    }

    let mut registry = ManagedSet::new();
    let verdict = drive(cluster, options, config, &mut registry).await;
    let cleanup_failures = registry.cleanup(cluster).await;
    ScenarioReport {
        scenario: config.name.clone(),
        verdict,
        cleanup_failures,
        skipped: false,
    }
}

/// Everything before cleanup; any early return still reaches teardown.
async fn drive(
    cluster: &dyn Cluster,
    options: &HarnessOptions,
    config: &ScenarioConfig,
    registry: &mut ManagedSet,
) -> Verdict {
    let namespace =
        config.namespace.clone().unwrap_or_else(|| options.test_namespace.clone());
    let run = Run {
        meta: ObjectMeta::new(unique_name(&config.name), &namespace),
        spec: RunSpec {
            task: config.task.clone(),
            service_account: config
                .service_account
                .clone()
                .unwrap_or_else(|| options.service_account.clone()),
            params: config.params.clone(),
        },
        status: virtrun_api::RunStatus::default(),
    };

    // Register the expected VM up front in case the task creates it; a name
    // taken from run results is registered once the results exist.
    if let Some(target) = &config.target {
        if let TargetName::Explicit(name) = &target.name {
            let vm_namespace = target.namespace.clone().unwrap_or_else(|| namespace.clone());
            registry.register(ObjectRef::new(ResourceKind::VirtualMachine, vm_namespace, name));
        }
    }

    let submitter = RunSubmitter::new(cluster, options.poll());
    let timeout = config.timeout.unwrap_or(options.run_timeout);

    let observed = match submitter.submit(&run, registry).await {
        Ok(mut handle) => match submitter.await_completion(&mut handle, timeout).await {
            Ok(outcome) => outcome,
            Err(HarnessError::RunDeadline {
                last_phase,
                partial_logs,
                ..
            }) => {
                let mut mismatches = vec![Mismatch::new(
                    "run.phase",
                    format!("terminal phase within {timeout:?}"),
                    last_phase,
                )];
                if !partial_logs.is_empty() {
                    mismatches.push(Mismatch::new("logs", "<run completed>", partial_logs));
                }
                return Verdict::new(mismatches);
            }
            Err(err) => {
                return Verdict::new(vec![Mismatch::new(
                    "run.phase",
                    "terminal phase",
                    err.to_string(),
                )]);
            }
        },
        // Admission rejection is a terminal observation, not a harness
        // failure: the expectation decides whether it was wanted.
        Err(HarnessError::Submit(err)) => RunOutcome::rejected(&err.to_string()),
        Err(err) => {
            return Verdict::new(vec![Mismatch::new("submit", "run created", err.to_string())]);
        }
    };

    let mut verdict = evaluate(&observed, &config.expectation);
    if let Some(target) = &config.target {
        let target_verdict =
            check_target(cluster, options, target, &observed, &namespace, registry).await;
        verdict = verdict.merged(target_verdict);
    }
    verdict
}

/// Applies the downstream assertion, folding failures into mismatches.
async fn check_target(
    cluster: &dyn Cluster,
    options: &HarnessOptions,
    target: &TargetCheck,
    observed: &RunOutcome,
    default_namespace: &str,
    registry: &mut ManagedSet,
) -> Verdict {
    let namespace =
        target.namespace.clone().unwrap_or_else(|| default_namespace.to_string());
    let name = match &target.name {
        TargetName::Explicit(name) => name.clone(),
        TargetName::FromResult(key) => match observed.results.get(key) {
            Some(name) => {
                registry.register(ObjectRef::new(
                    ResourceKind::VirtualMachine,
                    namespace.clone(),
                    name,
                ));
                name.clone()
            }
            None => {
                return Verdict::new(vec![Mismatch::new(
                    "target.name",
                    format!("run result {key:?} present"),
                    "<missing>",
                )]);
            }
        },
    };

    let timeout = target.timeout.unwrap_or(options.run_timeout);
    let poll = options.poll().with_timeout(timeout);

    match target.policy {
        TargetPolicy::MustExist | TargetPolicy::MustReach(_) => {
            if let Some(grace) = target.grace {
                sleep(grace).await;
            }
            let wanted = match target.policy {
                TargetPolicy::MustReach(phase) => format!("phase {phase} within {timeout:?}"),
                _ => format!("exists within {timeout:?}"),
            };
            let outcome = wait_for_resource(
                cluster.vms(),
                &namespace,
                &name,
                |vm: Option<&VirtualMachine>| match target.policy {
                    TargetPolicy::MustReach(phase) => {
                        vm.is_some_and(|vm| vm.status.phase == phase)
                    }
                    _ => vm.is_some(),
                },
                &poll,
            )
            .await;
            match outcome {
                Ok(_) => Verdict::pass(),
                Err(WaitError::DeadlineExceeded {
                    last_observed, ..
                }) => Verdict::new(vec![Mismatch::new("target.phase", wanted, last_observed)]),
                Err(err) => {
                    Verdict::new(vec![Mismatch::new("target.phase", wanted, err.to_string())])
                }
            }
        }
        TargetPolicy::MustNotExist | TargetPolicy::MustNotReach(_) => {
            let vms = cluster.vms();
            let fetch = || {
                let namespace = namespace.clone();
                let name = name.clone();
                async move { vms.get(&namespace, &name).await }
            };
            let wanted = match target.policy {
                TargetPolicy::MustNotReach(phase) => format!("never phase {phase}"),
                _ => "never created".to_string(),
            };
            // The single check already sits at the end of the window, so the
            // grace period only matters when it outlasts the window.
            let window = target.grace.map_or(timeout, |grace| timeout.max(grace));
            let outcome = confirm_never(
                fetch,
                |vm: Option<&VirtualMachine>| match target.policy {
                    TargetPolicy::MustNotReach(phase) => {
                        vm.is_some_and(|vm| vm.status.phase == phase)
                    }
                    _ => vm.is_some(),
                },
                window,
                options.poll_interval,
            )
            .await;
            match outcome {
                Ok(()) => Verdict::pass(),
                Err(WaitError::ConditionReached {
                    observed,
                }) => Verdict::new(vec![Mismatch::new("target.phase", wanted, observed)]),
                Err(err) => {
                    Verdict::new(vec![Mismatch::new("target.phase", wanted, err.to_string())])
                }
            }
        }
    }
}
