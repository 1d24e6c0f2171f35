//! Exit codes for the molt-autopilot CLI.
//!
//! Exit code ranges:
//! - 0: the run reached its end (individual step failures included)
//! - 10-19: user/environment errors (recoverable by user action)
//! - 20-29: internal errors

use crate::orchestrate::RunReport;
use ma_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Run completed; wallet, registration and hire may still have failed.
    Completed = 0,

    /// Invalid arguments
    ArgsError = 10,

    /// The tool could not be launched even after an install attempt
    ToolUnavailable = 11,

    /// Config file missing, unparsable or invalid
    ConfigError = 12,

    /// Internal error (bug - please report)
    InternalError = 20,

    /// I/O error
    IoError = 21,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    pub fn is_success(self) -> bool {
        self == ExitCode::Completed
    }

    pub fn is_user_error(self) -> bool {
        (10..20).contains(&self.as_i32())
    }

    pub fn is_internal_error(self) -> bool {
        self.as_i32() >= 20
    }

    /// Stable name for JSON output.
    pub fn code_name(&self) -> &'static str {
        match self {
            ExitCode::Completed => "OK_COMPLETED",
            ExitCode::ArgsError => "ERR_ARGS",
            ExitCode::ToolUnavailable => "ERR_TOOL_UNAVAILABLE",
            ExitCode::ConfigError => "ERR_CONFIG",
            ExitCode::InternalError => "ERR_INTERNAL",
            ExitCode::IoError => "ERR_IO",
        }
    }

    /// Exit code for a finished run.
    pub fn for_report(report: &RunReport) -> Self {
        if report.completed {
            ExitCode::Completed
        } else if !report.tool_available {
            ExitCode::ToolUnavailable
        } else {
            ExitCode::InternalError
        }
    }
}

impl From<&Error> for ExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Config(_) | Error::InvalidConfig(_) => ExitCode::ConfigError,
            Error::ToolUnavailable { .. } => ExitCode::ToolUnavailable,
            Error::Io { .. } | Error::ActivityLog(_) | Error::State(_) => ExitCode::IoError,
            Error::OperationFailed { .. } | Error::Json(_) => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl std::fmt::Display for ExitCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.code_name(), self.as_i32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(tool_available: bool, completed: bool) -> RunReport {
        RunReport {
            run_id: "run-test".to_string(),
            tool_available,
            install_attempted: !tool_available,
            strategy: None,
            wallet: None,
            registration: None,
            hire: None,
            completed,
            write_failures: 0,
        }
    }

    #[test]
    fn test_values_are_stable() {
        assert_eq!(ExitCode::Completed.as_i32(), 0);
        assert_eq!(ExitCode::ArgsError.as_i32(), 10);
        assert_eq!(ExitCode::ToolUnavailable.as_i32(), 11);
        assert_eq!(ExitCode::ConfigError.as_i32(), 12);
        assert_eq!(ExitCode::InternalError.as_i32(), 20);
        assert_eq!(ExitCode::IoError.as_i32(), 21);
    }

    #[test]
    fn test_ranges() {
        assert!(ExitCode::Completed.is_success());
        assert!(ExitCode::ConfigError.is_user_error());
        assert!(!ExitCode::ConfigError.is_internal_error());
        assert!(ExitCode::IoError.is_internal_error());
    }

    #[test]
    fn test_for_report() {
        assert_eq!(ExitCode::for_report(&report(true, true)), ExitCode::Completed);
        assert_eq!(
            ExitCode::for_report(&report(false, false)),
            ExitCode::ToolUnavailable
        );
    }

    #[test]
    fn test_from_error() {
        let err = Error::InvalidConfig("tool.name must not be empty".into());
        assert_eq!(ExitCode::from(&err), ExitCode::ConfigError);
        let err = Error::ToolUnavailable {
            tool: "mltl".into(),
            detail: "mltl not found".into(),
        };
        assert_eq!(ExitCode::from(&err), ExitCode::ToolUnavailable);
    }

    #[test]
    fn test_display() {
        assert_eq!(ExitCode::ConfigError.to_string(), "ERR_CONFIG (12)");
    }
}
