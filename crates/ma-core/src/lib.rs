//! Molt Autopilot Core Library
//!
//! This library provides the core functionality for the autonomous
//! registration run:
//! - Strategy-based invocation of the external `mltl` tool
//! - The bounded, shared activity log
//! - Configuration loading and validation
//! - The fixed availability / wallet / register / hire sequence
//! - Exit codes and logging setup for the CLI
//!
//! The binary entry point is in `main.rs`.

pub mod activity;
pub mod config;
pub mod exit_codes;
mod fsutil;
pub mod logging;
pub mod orchestrate;
pub mod runner;
pub mod state;

// Re-export test utilities for integration tests
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
