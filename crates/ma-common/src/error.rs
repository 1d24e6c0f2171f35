//! Error types for Molt Autopilot.
//!
//! Errors carry a stable numeric code and a category so the binary can map
//! them to exit codes and agents can parse them from JSON output:
//!
//! ```json
//! { "code": 30, "category": "tool", "message": "mltl not available: mltl not found" }
//! ```
//!
//! Only tool unavailability is fatal to a run. Individual step failures are
//! recovered inside the orchestration and never surface here.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Molt Autopilot operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for grouping related errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Configuration file and validation errors.
    Config,
    /// External tool availability and invocation.
    Tool,
    /// Activity log and state persistence.
    Storage,
    /// File I/O and serialization errors.
    Io,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorCategory::Config => write!(f, "config"),
            ErrorCategory::Tool => write!(f, "tool"),
            ErrorCategory::Storage => write!(f, "storage"),
            ErrorCategory::Io => write!(f, "io"),
        }
    }
}

/// Unified error type for Molt Autopilot.
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors (10-19)
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // Storage errors (20-29)
    #[error("activity log error: {0}")]
    ActivityLog(String),

    #[error("state record error: {0}")]
    State(String),

    // Tool errors (30-39)
    #[error("{tool} not available: {detail}")]
    ToolUnavailable { tool: String, detail: String },

    #[error("{operation} failed: {detail}")]
    OperationFailed { operation: String, detail: String },

    // I/O errors (60-69)
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Stable error code, grouped by category.
    pub fn code(&self) -> u32 {
        match self {
            Error::Config(_) => 10,
            Error::InvalidConfig(_) => 11,
            Error::ActivityLog(_) => 20,
            Error::State(_) => 21,
            Error::ToolUnavailable { .. } => 30,
            Error::OperationFailed { .. } => 31,
            Error::Io { .. } => 60,
            Error::Json(_) => 61,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Config(_) | Error::InvalidConfig(_) => ErrorCategory::Config,
            Error::ActivityLog(_) | Error::State(_) => ErrorCategory::Storage,
            Error::ToolUnavailable { .. } | Error::OperationFailed { .. } => ErrorCategory::Tool,
            Error::Io { .. } | Error::Json(_) => ErrorCategory::Io,
        }
    }

    /// Whether the run can continue past this error.
    ///
    /// Tool unavailability ends a run; a single failed operation does not.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::OperationFailed { .. })
    }

    /// Structured form for JSON output.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.code(),
            "category": self.category(),
            "message": self.to_string(),
            "recoverable": self.is_recoverable(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_and_categories() {
        let err = Error::ToolUnavailable {
            tool: "mltl".to_string(),
            detail: "mltl not found".to_string(),
        };
        assert_eq!(err.code(), 30);
        assert_eq!(err.category(), ErrorCategory::Tool);
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "mltl not available: mltl not found");

        let err = Error::InvalidConfig("bad".to_string());
        assert_eq!(err.code(), 11);
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_operation_failed_is_recoverable() {
        let err = Error::OperationFailed {
            operation: "hire".to_string(),
            detail: "timeout".to_string(),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_to_json() {
        let err = Error::Config("missing home".to_string());
        let json = err.to_json();
        assert_eq!(json["code"], 10);
        assert_eq!(json["category"], "config");
        assert_eq!(json["recoverable"], false);
    }
}
