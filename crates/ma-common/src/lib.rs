//! Molt Autopilot common types, paths, and errors.
//!
//! This crate provides foundational types shared across ma-core modules:
//! - Activity log entries and the run state record
//! - Identity and working directory resolution
//! - Common error types with stable codes
//! - Output format specifications

pub mod error;
pub mod output;
pub mod paths;
pub mod record;

pub use error::{Error, ErrorCategory, Result};
pub use output::OutputFormat;
pub use paths::{AutopilotPaths, ACTIVITY_LOG_FILENAME, STATE_FILENAME, WALLET_OUTPUT_FILENAME};
pub use record::{now_timestamp, truncate_chars, ActivityDetails, ActivityEntry, StateRecord};
