//! Filesystem layout for the identity and tool working directories.
//!
//! Resolution order for each directory:
//! 1. Explicit override (CLI flag or config file)
//! 2. Environment variable (`MOLT_AUTOPILOT_IDENTITY_DIR`, `MOLT_AUTOPILOT_WORK_DIR`)
//! 3. `~/.<agent>_identity` and `~/.<agent>_moltlaunch`

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Activity log filename inside the identity directory.
pub const ACTIVITY_LOG_FILENAME: &str = "activity_log.json";

/// Raw wallet query output inside the working directory.
pub const WALLET_OUTPUT_FILENAME: &str = "wallet_out.txt";

/// Last-run state record inside the working directory.
pub const STATE_FILENAME: &str = "state.json";

const IDENTITY_DIR_ENV: &str = "MOLT_AUTOPILOT_IDENTITY_DIR";
const WORK_DIR_ENV: &str = "MOLT_AUTOPILOT_WORK_DIR";

/// Resolved directories for one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutopilotPaths {
    /// Holds the shared activity log.
    pub identity_dir: PathBuf,
    /// Tool-scoped directory for wallet output and run state.
    pub work_dir: PathBuf,
}

impl AutopilotPaths {
    /// Use explicit directories as-is.
    pub fn new(identity_dir: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            identity_dir: identity_dir.into(),
            work_dir: work_dir.into(),
        }
    }

    /// Resolve directories for `agent_name`, honoring overrides and env vars.
    pub fn resolve(
        agent_name: &str,
        identity_override: Option<&Path>,
        work_override: Option<&Path>,
    ) -> Result<Self> {
        let slug = agent_slug(agent_name);

        let identity_dir = match identity_override {
            Some(p) => p.to_path_buf(),
            None => match std::env::var(IDENTITY_DIR_ENV) {
                Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => home_dir()?.join(format!(".{slug}_identity")),
            },
        };

        let work_dir = match work_override {
            Some(p) => p.to_path_buf(),
            None => match std::env::var(WORK_DIR_ENV) {
                Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
                _ => home_dir()?.join(format!(".{slug}_moltlaunch")),
            },
        };

        Ok(Self {
            identity_dir,
            work_dir,
        })
    }

    pub fn activity_log(&self) -> PathBuf {
        self.identity_dir.join(ACTIVITY_LOG_FILENAME)
    }

    pub fn wallet_output(&self) -> PathBuf {
        self.work_dir.join(WALLET_OUTPUT_FILENAME)
    }

    pub fn state_file(&self) -> PathBuf {
        self.work_dir.join(STATE_FILENAME)
    }

    /// Create both directories if absent.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [&self.identity_dir, &self.work_dir] {
            std::fs::create_dir_all(dir).map_err(|e| Error::Io {
                path: dir.clone(),
                source: e,
            })?;
        }
        Ok(())
    }
}

fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().ok_or_else(|| Error::Config("cannot determine home directory".to_string()))
}

/// Lowercase alphanumeric slug used in default directory names.
fn agent_slug(name: &str) -> String {
    let slug: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    if slug.is_empty() {
        "agent".to_string()
    } else {
        slug
    }
}
