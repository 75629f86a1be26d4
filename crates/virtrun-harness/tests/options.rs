// crates/virtrun-harness/tests/options.rs
// ============================================================================
// Module: Options Tests
// Description: Options resolution from defaults and TOML files.
// Purpose: Pin default values, file overrides, and strict validation.
// Dependencies: virtrun-harness, tempfile
// ============================================================================

use std::io::Write;
use std::time::Duration;

use tempfile::NamedTempFile;
use virtrun_harness::HarnessEnv;
use virtrun_harness::HarnessOptions;
use virtrun_harness::OptionsError;

fn options_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file");
    file.write_all(contents.as_bytes()).expect("write");
    file
}

#[test]
fn defaults_are_complete_and_positive() {
    let options = HarnessOptions::default();
    assert_eq!(options.deploy_namespace, "virtrun-system");
    assert_eq!(options.test_namespace, "virtrun-e2e");
    assert_eq!(options.service_account, "virtrun-e2e-runner");
    assert_eq!(options.poll_interval, Duration::from_millis(500));
    assert_eq!(options.run_timeout, Duration::from_secs(120));
    assert!(options.skip_tags.is_empty());
}

#[test]
fn file_values_override_defaults() {
    let file = options_file(
        r#"
test_namespace = "custom-e2e"
poll_interval_ms = 250
run_timeout_sec = 30
skip_tags = ["slow", "gpu"]
"#,
    );
    let options = HarnessOptions::from_file(file.path()).expect("load");
    assert_eq!(options.test_namespace, "custom-e2e");
    assert_eq!(options.deploy_namespace, "virtrun-system");
    assert_eq!(options.poll_interval, Duration::from_millis(250));
    assert_eq!(options.run_timeout, Duration::from_secs(30));
    assert!(options.is_skipped("slow"));
    assert!(options.is_skipped("gpu"));
    assert!(!options.is_skipped("fast"));
}

#[test]
fn unknown_file_keys_are_rejected() {
    let file = options_file("unknown_knob = true\n");
    let err = HarnessOptions::from_file(file.path()).expect_err("strict parse");
    assert!(matches!(err, OptionsError::Parse { .. }));
}

#[test]
fn missing_file_is_an_io_error() {
    let err = HarnessOptions::from_file(std::path::Path::new("/nonexistent/options.toml"))
        .expect_err("missing file");
    assert!(matches!(err, OptionsError::Io { .. }));
}

#[test]
fn zero_durations_fail_validation() {
    let file = options_file("poll_interval_ms = 0\n");
    let err = HarnessOptions::from_file(file.path()).expect_err("zero interval");
    assert!(matches!(err, OptionsError::Invalid(_)));

    let file = options_file("run_timeout_sec = 0\n");
    let err = HarnessOptions::from_file(file.path()).expect_err("zero timeout");
    assert!(matches!(err, OptionsError::Invalid(_)));
}

#[test]
fn empty_test_namespace_fails_validation() {
    let file = options_file("test_namespace = \"\"\n");
    let err = HarnessOptions::from_file(file.path()).expect_err("empty namespace");
    assert!(matches!(err, OptionsError::Invalid(_)));
}

#[test]
fn poll_config_reflects_resolved_durations() {
    let file = options_file("poll_interval_ms = 100\nrun_timeout_sec = 10\n");
    let options = HarnessOptions::from_file(file.path()).expect("load");
    let poll = options.poll();
    assert_eq!(poll.interval, Duration::from_millis(100));
    assert_eq!(poll.timeout, Duration::from_secs(10));
}

#[test]
fn env_keys_are_stable() {
    assert_eq!(HarnessEnv::OptionsFile.as_str(), "VIRTRUN_OPTIONS_FILE");
    assert_eq!(HarnessEnv::TestNamespace.as_str(), "VIRTRUN_TEST_NAMESPACE");
    assert_eq!(HarnessEnv::SkipTags.as_str(), "VIRTRUN_SKIP_TAGS");
}
