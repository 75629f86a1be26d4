// crates/virtrun-harness/tests/scenario.rs
// ============================================================================
// Module: Scenario Driver Tests
// Description: Target-check timing behavior under virtual time.
// Purpose: Pin how grace periods interact with positive and negative windows.
// Dependencies: virtrun-harness, virtrun-api, tokio, tokio-stream
// ============================================================================

//! Scenario tests run under paused tokio time against a fake cluster with a
//! minimal run completer, so the driver's end-to-end timing is observable.

use std::time::Duration;

use tokio::time::Instant;
use tokio_stream::StreamExt;
use virtrun_api::Cluster;
use virtrun_api::ObjectMeta;
use virtrun_api::ResourceOps;
use virtrun_api::RunPhase;
use virtrun_api::Selector;
use virtrun_api::VirtualMachine;
use virtrun_api::WatchEvent;
use virtrun_api::fake::FakeCluster;
use virtrun_harness::Expectation;
use virtrun_harness::HarnessOptions;
use virtrun_harness::ScenarioConfig;
use virtrun_harness::TargetCheck;
use virtrun_harness::TargetName;
use virtrun_harness::TargetPolicy;
use virtrun_harness::run_scenario;
use virtrun_harness::unique_name;

fn options() -> HarnessOptions {
    HarnessOptions {
        poll_interval: Duration::from_millis(50),
        run_timeout: Duration::from_secs(10),
        ..HarnessOptions::default()
    }
}

/// Marks every run created in `namespace` as succeeded, so scenarios reach
/// their target check without a full task controller.
async fn spawn_completer(cluster: &FakeCluster, namespace: &str) {
    let watch = cluster
        .runs()
        .watch(namespace, &Selector::everything())
        .await
        .expect("completer watch");
    let cluster = cluster.clone();
    tokio::spawn(async move {
        let mut watch = watch;
        while let Some(Ok(event)) = watch.next().await {
            if let WatchEvent::Added(run) = event {
                let _ = cluster.update_run(&run.meta.namespace, &run.meta.name, |run| {
                    run.status.phase = RunPhase::Succeeded;
                });
            }
        }
    });
}

#[tokio::test(start_paused = true)]
async fn grace_delays_a_positive_target_check() {
    let cluster = FakeCluster::new();
    let opts = options();
    spawn_completer(&cluster, &opts.test_namespace).await;

    let name = unique_name("graced-vm");
    let vm = VirtualMachine {
        meta: ObjectMeta::new(&name, &opts.test_namespace),
        ..Default::default()
    };
    cluster.vms().create(&vm).await.expect("create vm");

    let mut check = TargetCheck::new(TargetName::Explicit(name), TargetPolicy::MustExist);
    check.grace = Some(Duration::from_secs(2));
    let config = ScenarioConfig::new("graced existence", "noop", Expectation::success())
        .with_target(check);

    let started = Instant::now();
    let report = run_scenario(&cluster, &opts, &config).await;
    assert!(report.passed(), "unexpected report: {}", report.render());
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn grace_extends_a_short_negative_window() {
    let cluster = FakeCluster::new();
    let opts = options();
    spawn_completer(&cluster, &opts.test_namespace).await;

    let mut check = TargetCheck::new(
        TargetName::Explicit(unique_name("never-vm")),
        TargetPolicy::MustNotExist,
    );
    check.timeout = Some(Duration::from_secs(1));
    check.grace = Some(Duration::from_secs(5));
    let config = ScenarioConfig::new("graced absence", "noop", Expectation::success())
        .with_target(check);

    let started = Instant::now();
    let report = run_scenario(&cluster, &opts, &config).await;
    assert!(report.passed(), "unexpected report: {}", report.render());
    assert!(started.elapsed() >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn small_grace_does_not_shorten_a_negative_window() {
    let cluster = FakeCluster::new();
    let opts = options();
    spawn_completer(&cluster, &opts.test_namespace).await;

    let name = unique_name("late-vm");
    let mut check =
        TargetCheck::new(TargetName::Explicit(name.clone()), TargetPolicy::MustNotExist);
    check.timeout = Some(Duration::from_secs(2));
    check.grace = Some(Duration::from_millis(100));
    let config = ScenarioConfig::new("late creation is caught", "noop", Expectation::success())
        .with_target(check);

    // A VM appearing after the grace period but inside the window must still
    // trip the check.
    let spoiler = cluster.clone();
    let ns = opts.test_namespace.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        let vm = VirtualMachine {
            meta: ObjectMeta::new(&name, &ns),
            ..Default::default()
        };
        let _ = spoiler.vms().create(&vm).await;
    });

    let report = run_scenario(&cluster, &opts, &config).await;
    assert!(!report.passed());
    assert!(report.verdict.mismatches().iter().any(|m| m.field == "target.phase"));
}
