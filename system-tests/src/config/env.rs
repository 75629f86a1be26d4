// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for system tests.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::time::Duration;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Optional timeout override in seconds (positive integer).
    TimeoutSeconds,
    /// Optional poll interval override in milliseconds (positive integer).
    PollIntervalMs,
    /// Optional tracing filter directive for test output.
    LogFilter,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TimeoutSeconds => "VIRTRUN_SYSTEM_TEST_TIMEOUT_SEC",
            Self::PollIntervalMs => "VIRTRUN_SYSTEM_TEST_POLL_MS",
            Self::LogFilter => "VIRTRUN_SYSTEM_TEST_LOG",
        }
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SystemTestConfig {
    /// Optional run timeout override.
    pub timeout: Option<Duration>,
    /// Optional poll interval override.
    pub poll_interval: Option<Duration>,
    /// Optional tracing filter directive.
    pub log_filter: Option<String>,
}

impl SystemTestConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is
    /// empty, or is not a positive integer where one is required.
    pub fn load() -> Result<Self, String> {
        let timeout = read_env_nonempty(SystemTestEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_positive(SystemTestEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?
            .map(Duration::from_secs);
        let poll_interval = read_env_nonempty(SystemTestEnv::PollIntervalMs.as_str())?
            .map(|value| parse_positive(SystemTestEnv::PollIntervalMs.as_str(), &value))
            .transpose()?
            .map(Duration::from_millis);
        let log_filter = read_env_nonempty(SystemTestEnv::LogFilter.as_str())?;
        Ok(Self {
            timeout,
            poll_interval,
            log_filter,
        })
    }
}

// ============================================================================
// SECTION: Parsing Helpers
// ============================================================================

/// Reads an environment variable, rejecting non-UTF-8 and empty values.
fn read_env_nonempty(key: &str) -> Result<Option<String>, String> {
    match env::var(key) {
        Ok(value) if value.trim().is_empty() => {
            Err(format!("{key} is set but empty"))
        }
        Ok(value) => Ok(Some(value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(env::VarError::NotUnicode(_)) => Err(format!("{key} is not valid UTF-8")),
    }
}

/// Parses a positive integer value.
fn parse_positive(key: &str, raw: &str) -> Result<u64, String> {
    let value: u64 =
        raw.trim().parse().map_err(|_| format!("{key} must be a positive integer"))?;
    if value == 0 {
        return Err(format!("{key} must be greater than zero"));
    }
    Ok(value)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod env_tests;
