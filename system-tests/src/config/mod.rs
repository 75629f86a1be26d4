// system-tests/src/config/mod.rs
// ============================================================================
// Module: System Test Configuration
// Description: Configuration module for system tests.
// Purpose: Group environment-backed configuration helpers.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Configuration for system tests lives here, separate from test bodies.

pub mod env;

pub use env::SystemTestConfig;
pub use env::SystemTestEnv;
