//! Registration outcome classification.
//!
//! The tool reports "already registered" only as free-form text, so the
//! outcome is derived from the exit status plus a case-insensitive substring
//! match over stdout and stderr together. The match ignores which stream the
//! marker appeared in and the exit code, so an unrelated error that mentions
//! e.g. "exists" is also read as already-registered.

use serde::{Deserialize, Serialize};

/// Case-insensitive markers that mean the identity is already registered.
pub const ALREADY_MARKER: &str = "already";
pub const EXISTS_MARKER: &str = "exists";
pub const REGISTERED_MARKER: &str = "registered";

pub const ALREADY_REGISTERED_MARKERS: [&str; 3] =
    [ALREADY_MARKER, EXISTS_MARKER, REGISTERED_MARKER];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationOutcome {
    /// The tool exited 0.
    Registered,
    /// Non-zero exit whose output says the identity already exists.
    AlreadyRegistered,
    Failed,
}

impl RegistrationOutcome {
    /// Registered or already registered.
    pub fn is_success_equivalent(self) -> bool {
        !matches!(self, RegistrationOutcome::Failed)
    }
}

/// Classify a registration attempt from its exit status and combined output.
pub fn classify_registration(succeeded: bool, combined_output: &str) -> RegistrationOutcome {
    if succeeded {
        return RegistrationOutcome::Registered;
    }
    let lowered = combined_output.to_lowercase();
    if ALREADY_REGISTERED_MARKERS
        .iter()
        .any(|marker| lowered.contains(marker))
    {
        RegistrationOutcome::AlreadyRegistered
    } else {
        RegistrationOutcome::Failed
    }
}
