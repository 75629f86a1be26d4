// crates/virtrun-harness/src/expect.rs
// ============================================================================
// Module: Expectation Engine
// Description: Compares observed run outcomes against declared expectations.
// Purpose: Produce one aggregated verdict per scenario with full diagnostics.
// Dependencies: crate::runner, serde
// ============================================================================

//! ## Overview
//! [`evaluate`] never fails on a mismatch; it returns a [`Verdict`] listing
//! every divergence so a scenario failure is diagnosable without re-running.
//! An outcome-kind mismatch does not suppress the log and result checks; all
//! applicable mismatches are collected in one pass. Given the same inputs,
//! the verdict is identical every time.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

use crate::runner::RunOutcome;

// ============================================================================
// SECTION: Expectations
// ============================================================================

/// Expected terminal outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedOutcome {
    /// The run must succeed.
    Success,
    /// The run must fail.
    Failure,
}

/// Expected run results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedResults {
    /// Results are not checked.
    Unchecked,
    /// The run must emit no results at all.
    Empty,
    /// Declared keys must be present with equal values; extra observed keys
    /// are ignored.
    Entries(BTreeMap<String, String>),
}

/// Declared expectation for one scenario.
///
/// # Invariants
/// - Immutable after construction; evaluation never mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expectation {
    /// Expected terminal outcome.
    pub outcome: ExpectedOutcome,
    /// Substrings that must each occur somewhere in the captured logs.
    /// Order among them is irrelevant.
    #[serde(default)]
    pub logs: Vec<String>,
    /// Expected results.
    pub results: ExpectedResults,
}

impl Expectation {
    /// Creates an expectation of success with no log or result checks.
    #[must_use]
    pub fn success() -> Self {
        Self {
            outcome: ExpectedOutcome::Success,
            logs: Vec::new(),
            results: ExpectedResults::Unchecked,
        }
    }

    /// Creates an expectation of failure with no log or result checks.
    #[must_use]
    pub fn failure() -> Self {
        Self {
            outcome: ExpectedOutcome::Failure,
            logs: Vec::new(),
            results: ExpectedResults::Unchecked,
        }
    }

    /// Adds an expected log substring.
    #[must_use]
    pub fn with_log(mut self, needle: impl Into<String>) -> Self {
        self.logs.push(needle.into());
        self
    }

    /// Sets the expected results.
    #[must_use]
    pub fn with_results(mut self, results: ExpectedResults) -> Self {
        self.results = results;
        self
    }
}

// ============================================================================
// SECTION: Verdicts
// ============================================================================

/// One divergence between expectation and observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    /// Field the divergence applies to.
    pub field: String,
    /// Expected value or condition.
    pub expected: String,
    /// Observed value.
    pub actual: String,
}

impl Mismatch {
    /// Creates a mismatch entry.
    #[must_use]
    pub fn new(
        field: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Aggregated judgment for one scenario.
///
/// # Invariants
/// - Constructed once per scenario; immutable after construction.
/// - Never partially reported: all mismatches travel together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    mismatches: Vec<Mismatch>,
}

impl Verdict {
    /// Creates a verdict from collected mismatches.
    #[must_use]
    pub fn new(mismatches: Vec<Mismatch>) -> Self {
        Self {
            mismatches,
        }
    }

    /// Creates a passing verdict.
    #[must_use]
    pub fn pass() -> Self {
        Self {
            mismatches: Vec::new(),
        }
    }

    /// True when no mismatch was recorded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Ordered mismatch list.
    #[must_use]
    pub fn mismatches(&self) -> &[Mismatch] {
        &self.mismatches
    }

    /// Merges another verdict's mismatches into this one.
    #[must_use]
    pub fn merged(mut self, other: Self) -> Self {
        self.mismatches.extend(other.mismatches);
        self
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed() {
            return f.write_str("pass");
        }
        writeln!(f, "fail ({} mismatches)", self.mismatches.len())?;
        for mismatch in &self.mismatches {
            writeln!(
                f,
                "  {}: expected {}, got {}",
                mismatch.field, mismatch.expected, mismatch.actual
            )?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Judges an observed outcome against an expectation.
///
/// Deterministic: identical inputs produce identical verdicts, and two
/// expectations declaring the same needles in different orders also produce
/// identical verdicts. Mismatches are appended in a fixed order: outcome
/// kind, then missing log needles in lexicographic order, then result keys
/// in key order.
#[must_use]
pub fn evaluate(observed: &RunOutcome, expected: &Expectation) -> Verdict {
    let mut mismatches = Vec::new();

    let observed_success = observed.phase.is_terminal() && observed.succeeded();
    let outcome_matches = match expected.outcome {
        ExpectedOutcome::Success => observed_success,
        ExpectedOutcome::Failure => !observed_success,
    };
    if !outcome_matches {
        let wanted = match expected.outcome {
            ExpectedOutcome::Success => "Succeeded",
            ExpectedOutcome::Failure => "Failed",
        };
        mismatches.push(Mismatch::new("outcome", wanted, observed.phase.to_string()));
    }

    // Needles are a set: sorting here keeps the verdict independent of the
    // order they were declared in.
    let mut needles: Vec<&str> = expected.logs.iter().map(String::as_str).collect();
    needles.sort_unstable();
    needles.dedup();
    for needle in needles {
        if !observed.logs.contains(needle) {
            mismatches.push(Mismatch::new(
                "logs",
                format!("contains {needle:?}"),
                truncate_for_report(&observed.logs),
            ));
        }
    }

    match &expected.results {
        ExpectedResults::Unchecked => {}
        ExpectedResults::Empty => {
            if !observed.results.is_empty() {
                let keys: Vec<&str> = observed.results.keys().map(String::as_str).collect();
                mismatches.push(Mismatch::new(
                    "results",
                    "no results",
                    format!("keys {keys:?}"),
                ));
            }
        }
        ExpectedResults::Entries(entries) => {
            for (key, expected_value) in entries {
                match observed.results.get(key) {
                    Some(actual) if actual == expected_value => {}
                    Some(actual) => {
                        mismatches.push(Mismatch::new(
                            format!("results.{key}"),
                            format!("{expected_value:?}"),
                            format!("{actual:?}"),
                        ));
                    }
                    None => {
                        mismatches.push(Mismatch::new(
                            format!("results.{key}"),
                            format!("{expected_value:?}"),
                            "<missing>",
                        ));
                    }
                }
            }
        }
    }

    Verdict::new(mismatches)
}

/// Caps the log excerpt carried in a mismatch.
fn truncate_for_report(logs: &str) -> String {
    const MAX_EXCERPT: usize = 400;
    if logs.is_empty() {
        return "<no logs>".to_string();
    }
    if logs.len() <= MAX_EXCERPT {
        return format!("{logs:?}");
    }
    let mut cut = MAX_EXCERPT;
    while !logs.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{:?}…", &logs[..cut])
}
