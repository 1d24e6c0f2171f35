//! Semantic validation of a parsed configuration.

use super::AutopilotConfig;
use thiserror::Error;
use tracing::warn;

/// Upper bound for every `*_timeout_secs` field (one day).
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("{field} must be at most {max} seconds")]
    TooLarge { field: &'static str, max: u64 },

    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("strategy #{index} has an empty program")]
    EmptyStrategyProgram { index: usize },
}

/// Check invariants serde cannot express.
///
/// An empty strategy list is allowed (every run then reports the tool as
/// unavailable) but logged.
pub fn validate_config(config: &AutopilotConfig) -> Result<(), ValidationError> {
    let tool = &config.tool;
    non_empty("tool.name", &tool.name)?;
    for (field, value) in [
        ("tool.default_timeout_secs", tool.default_timeout_secs),
        ("tool.probe_timeout_secs", tool.probe_timeout_secs),
        ("tool.reprobe_timeout_secs", tool.reprobe_timeout_secs),
        (
            "identity.registration_timeout_secs",
            config.identity.registration_timeout_secs,
        ),
        ("hire.timeout_secs", config.hire.timeout_secs),
    ] {
        timeout_secs(field, value)?;
    }
    positive("tool.max_output_bytes", tool.max_output_bytes as u64)?;
    positive("activity.max_entries", config.activity.max_entries as u64)?;

    if tool.strategies.is_empty() {
        warn!("no launch strategies configured; the tool will always be unavailable");
    }
    for (index, strategy) in tool.strategies.iter().enumerate() {
        if strategy.program.trim().is_empty() {
            return Err(ValidationError::EmptyStrategyProgram { index });
        }
    }
    if let Some(install) = &tool.install {
        non_empty("tool.install.program", &install.program)?;
        timeout_secs("tool.install.timeout_secs", install.timeout_secs)?;
    }

    non_empty("identity.name", &config.identity.name)?;
    non_empty("hire.agent_id", &config.hire.agent_id)?;
    non_empty("hire.task", &config.hire.task)?;
    Ok(())
}

fn positive(field: &'static str, value: u64) -> Result<(), ValidationError> {
    if value == 0 {
        return Err(ValidationError::ZeroValue { field });
    }
    Ok(())
}

fn timeout_secs(field: &'static str, value: u64) -> Result<(), ValidationError> {
    positive(field, value)?;
    if value > MAX_TIMEOUT_SECS {
        return Err(ValidationError::TooLarge {
            field,
            max: MAX_TIMEOUT_SECS,
        });
    }
    Ok(())
}

fn non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Empty { field });
    }
    Ok(())
}
