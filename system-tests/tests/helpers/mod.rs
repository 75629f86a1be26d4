// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for Virtrun system-tests.
// Purpose: Provide the scripted task controller, fixtures, and environment.
// Dependencies: system-tests, virtrun-api, virtrun-harness
// ============================================================================

//! ## Overview
//! Shared helpers for Virtrun system-tests.
//! Purpose: Provide the scripted task controller, fixtures, and environment.
//! Invariants:
//! - System-test execution is deterministic; all cluster behavior is scripted.
//! - Every scenario tears down what it provisioned, pass or fail.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod controller;
pub mod env;
pub mod fixtures;
