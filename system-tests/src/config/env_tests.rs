// system-tests/src/config/env_tests.rs
// ============================================================================
// Module: System Test Environment Tests
// Description: Unit tests for environment parsing helpers.
// Purpose: Pin strict parsing behavior for system test configuration.
// Dependencies: super
// ============================================================================

use super::SystemTestEnv;
use super::parse_positive;
use super::read_env_nonempty;

#[test]
fn env_keys_are_stable() {
    assert_eq!(SystemTestEnv::TimeoutSeconds.as_str(), "VIRTRUN_SYSTEM_TEST_TIMEOUT_SEC");
    assert_eq!(SystemTestEnv::PollIntervalMs.as_str(), "VIRTRUN_SYSTEM_TEST_POLL_MS");
    assert_eq!(SystemTestEnv::LogFilter.as_str(), "VIRTRUN_SYSTEM_TEST_LOG");
}

#[test]
fn absent_variable_reads_as_none() {
    let value = read_env_nonempty("VIRTRUN_SYSTEM_TEST_DOES_NOT_EXIST").expect("absent is fine");
    assert!(value.is_none());
}

#[test]
fn positive_integers_parse() {
    assert_eq!(parse_positive("KEY", "30").expect("valid"), 30);
    assert_eq!(parse_positive("KEY", " 5 ").expect("trimmed"), 5);
}

#[test]
fn zero_and_garbage_are_rejected() {
    assert!(parse_positive("KEY", "0").is_err());
    assert!(parse_positive("KEY", "-3").is_err());
    assert!(parse_positive("KEY", "soon").is_err());
}
