// crates/virtrun-harness/src/lib.rs
// ============================================================================
// Module: Virtrun Harness
// Description: Test orchestration and convergence-waiting harness.
// Purpose: Submit runs, wait for convergence, judge outcomes, clean up.
// Dependencies: virtrun-api, tokio, tracing
// ============================================================================

//! ## Overview
//! The harness drives end-to-end scenarios against an eventually-consistent
//! cluster: a [`scenario::ScenarioConfig`] describes the work and the
//! expectation, [`runner::RunSubmitter`] submits and tracks the run,
//! [`waiter`] polls for convergence under a hard deadline,
//! [`expect::evaluate`] renders one aggregated [`expect::Verdict`] per
//! scenario, and [`registry::ManagedSet`] guarantees teardown of everything
//! the scenario created, pass or fail.
//!
//! Operations within one scenario are strictly sequential; concurrency lives
//! above this crate (one worker per scenario, distinct generated names).

pub mod error;
pub mod expect;
pub mod options;
pub mod registry;
pub mod runner;
pub mod scenario;
pub mod waiter;

pub use error::HarnessError;
pub use expect::Expectation;
pub use expect::ExpectedOutcome;
pub use expect::ExpectedResults;
pub use expect::Mismatch;
pub use expect::Verdict;
pub use expect::evaluate;
pub use options::HarnessEnv;
pub use options::HarnessOptions;
pub use options::OptionsError;
pub use registry::CleanupFailure;
pub use registry::ManagedSet;
pub use runner::RunHandle;
pub use runner::RunOutcome;
pub use runner::RunSubmitter;
pub use scenario::ScenarioConfig;
pub use scenario::ScenarioReport;
pub use scenario::TargetCheck;
pub use scenario::TargetName;
pub use scenario::TargetPolicy;
pub use scenario::run_scenario;
pub use scenario::unique_name;
pub use waiter::PollConfig;
pub use waiter::WaitError;
