// crates/virtrun-harness/src/options.rs
// ============================================================================
// Module: Harness Options
// Description: Immutable harness configuration with file and env sources.
// Purpose: Replace ambient flags with one explicit options value.
// Dependencies: serde, toml, thiserror
// ============================================================================

//! ## Overview
//! Options are resolved once at startup (defaults, then an optional TOML
//! file, then `VIRTRUN_*` environment overrides) and threaded through
//! scenario setup as an immutable value. Parsing is strict: unknown file
//! keys, non-UTF-8 env values, and zero durations fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::waiter::PollConfig;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment keys recognized by the harness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HarnessEnv {
    /// Optional options-file path.
    OptionsFile,
    /// Namespace the cluster services are deployed in.
    DeployNamespace,
    /// Namespace scenarios create their resources in.
    TestNamespace,
    /// Service identity runs execute under.
    ServiceAccount,
    /// Poll interval override in milliseconds.
    PollIntervalMs,
    /// Run timeout override in seconds.
    RunTimeoutSec,
    /// Comma-separated scenario tags to skip.
    SkipTags,
}

impl HarnessEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OptionsFile => "VIRTRUN_OPTIONS_FILE",
            Self::DeployNamespace => "VIRTRUN_DEPLOY_NAMESPACE",
            Self::TestNamespace => "VIRTRUN_TEST_NAMESPACE",
            Self::ServiceAccount => "VIRTRUN_SERVICE_ACCOUNT",
            Self::PollIntervalMs => "VIRTRUN_POLL_INTERVAL_MS",
            Self::RunTimeoutSec => "VIRTRUN_RUN_TIMEOUT_SEC",
            Self::SkipTags => "VIRTRUN_SKIP_TAGS",
        }
    }

    fn read(self) -> Result<Option<String>, OptionsError> {
        match env::var(self.as_str()) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(env::VarError::NotUnicode(_)) => Err(OptionsError::InvalidEnv {
                key: self.as_str(),
                reason: "value is not valid UTF-8".to_string(),
            }),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Options loading and validation errors.
#[derive(Debug, Error)]
pub enum OptionsError {
    /// The options file could not be read.
    #[error("failed to read options file {path}: {source}")]
    Io {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The options file did not parse.
    #[error("failed to parse options file {path}: {source}")]
    Parse {
        /// Path that failed to parse.
        path: String,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// An environment override was malformed.
    #[error("invalid {key}: {reason}")]
    InvalidEnv {
        /// Offending environment key.
        key: &'static str,
        /// What was wrong with the value.
        reason: String,
    },

    /// A resolved value violated a constraint.
    #[error("invalid options: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: File Schema
// ============================================================================

/// TOML file schema; all fields optional, unknown keys rejected.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionsFile {
    deploy_namespace: Option<String>,
    test_namespace: Option<String>,
    service_account: Option<String>,
    poll_interval_ms: Option<u64>,
    run_timeout_sec: Option<u64>,
    #[serde(default)]
    skip_tags: Vec<String>,
}

// ============================================================================
// SECTION: Options
// ============================================================================

/// Immutable harness configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessOptions {
    /// Namespace the cluster services are deployed in.
    pub deploy_namespace: String,
    /// Namespace scenarios create their resources in.
    pub test_namespace: String,
    /// Service identity runs execute under by default.
    pub service_account: String,
    /// Delay between convergence polls.
    pub poll_interval: Duration,
    /// Default deadline for run completion.
    pub run_timeout: Duration,
    /// Scenario tags to skip.
    pub skip_tags: BTreeSet<String>,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            deploy_namespace: "virtrun-system".to_string(),
            test_namespace: "virtrun-e2e".to_string(),
            service_account: "virtrun-e2e-runner".to_string(),
            poll_interval: Duration::from_millis(500),
            run_timeout: Duration::from_secs(120),
            skip_tags: BTreeSet::new(),
        }
    }
}

impl HarnessOptions {
    /// Resolves options from defaults, the optional file named by
    /// `VIRTRUN_OPTIONS_FILE`, and `VIRTRUN_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] when any source is malformed.
    pub fn load() -> Result<Self, OptionsError> {
        let mut options = Self::default();
        if let Some(path) = HarnessEnv::OptionsFile.read()? {
            options.apply_file(Path::new(&path))?;
        }
        options.apply_env()?;
        options.validate()?;
        Ok(options)
    }

    /// Resolves options from defaults and one explicit file, then env
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`OptionsError`] when any source is malformed.
    pub fn from_file(path: &Path) -> Result<Self, OptionsError> {
        let mut options = Self::default();
        options.apply_file(path)?;
        options.apply_env()?;
        options.validate()?;
        Ok(options)
    }

    /// True when a scenario carrying `tag` should be skipped.
    #[must_use]
    pub fn is_skipped(&self, tag: &str) -> bool {
        self.skip_tags.contains(tag)
    }

    /// Returns the poll configuration derived from these options.
    #[must_use]
    pub const fn poll(&self) -> PollConfig {
        PollConfig::new(self.poll_interval, self.run_timeout)
    }

    fn apply_file(&mut self, path: &Path) -> Result<(), OptionsError> {
        let raw = fs::read_to_string(path).map_err(|source| OptionsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: OptionsFile = toml::from_str(&raw).map_err(|source| OptionsError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        if let Some(value) = file.deploy_namespace {
            self.deploy_namespace = value;
        }
        if let Some(value) = file.test_namespace {
            self.test_namespace = value;
        }
        if let Some(value) = file.service_account {
            self.service_account = value;
        }
        if let Some(value) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(value);
        }
        if let Some(value) = file.run_timeout_sec {
            self.run_timeout = Duration::from_secs(value);
        }
        self.skip_tags.extend(file.skip_tags);
        Ok(())
    }

    fn apply_env(&mut self) -> Result<(), OptionsError> {
        if let Some(value) = HarnessEnv::DeployNamespace.read()? {
            self.deploy_namespace = value;
        }
        if let Some(value) = HarnessEnv::TestNamespace.read()? {
            self.test_namespace = value;
        }
        if let Some(value) = HarnessEnv::ServiceAccount.read()? {
            self.service_account = value;
        }
        if let Some(value) = HarnessEnv::PollIntervalMs.read()? {
            let millis = parse_positive(HarnessEnv::PollIntervalMs, &value)?;
            self.poll_interval = Duration::from_millis(millis);
        }
        if let Some(value) = HarnessEnv::RunTimeoutSec.read()? {
            let secs = parse_positive(HarnessEnv::RunTimeoutSec, &value)?;
            self.run_timeout = Duration::from_secs(secs);
        }
        if let Some(value) = HarnessEnv::SkipTags.read()? {
            self.skip_tags.extend(
                value.split(',').map(str::trim).filter(|tag| !tag.is_empty()).map(str::to_string),
            );
        }
        Ok(())
    }

    fn validate(&self) -> Result<(), OptionsError> {
        if self.test_namespace.is_empty() {
            return Err(OptionsError::Invalid("test_namespace must not be empty".to_string()));
        }
        if self.poll_interval.is_zero() {
            return Err(OptionsError::Invalid("poll_interval must be positive".to_string()));
        }
        if self.run_timeout.is_zero() {
            return Err(OptionsError::Invalid("run_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

fn parse_positive(key: HarnessEnv, raw: &str) -> Result<u64, OptionsError> {
    let value: u64 = raw.trim().parse().map_err(|_| OptionsError::InvalidEnv {
        key: key.as_str(),
        reason: "must be a positive integer".to_string(),
    })?;
    if value == 0 {
        return Err(OptionsError::InvalidEnv {
            key: key.as_str(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}
