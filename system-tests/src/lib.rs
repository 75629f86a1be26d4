// system-tests/src/lib.rs
// ============================================================================
// Module: Virtrun System Tests Library
// Description: Shared configuration for system test scenarios.
// Purpose: Provide common utilities for Virtrun system-test binaries.
// Dependencies: std
// ============================================================================

//! ## Overview
//! This crate hosts shared configuration utilities used by the Virtrun
//! system-test binaries in `system-tests/tests`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
