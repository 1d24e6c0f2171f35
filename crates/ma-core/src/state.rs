//! Last-run state record and wallet side file.
//!
//! Both live in the tool working directory and are replaced wholesale.

use crate::fsutil::{write_atomic, WriteError};
use ma_common::StateRecord;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl From<WriteError> for StateError {
    fn from(err: WriteError) -> Self {
        StateError::Io {
            path: err.path,
            source: err.source,
        }
    }
}

impl From<StateError> for ma_common::Error {
    fn from(err: StateError) -> Self {
        match err {
            StateError::Io { path, source } => ma_common::Error::Io { path, source },
            other => ma_common::Error::State(other.to_string()),
        }
    }
}

/// Overwrite `path` with the pretty-printed state record.
pub fn write_state(path: &Path, state: &StateRecord) -> Result<(), StateError> {
    let content = serde_json::to_vec_pretty(state).map_err(|e| StateError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(write_atomic(path, &content)?)
}

/// Read the state record; `Ok(None)` when no run has completed yet.
pub fn read_state(path: &Path) -> Result<Option<StateRecord>, StateError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Io {
                path: path.to_path_buf(),
                source: e,
            })
        }
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|e| StateError::Json {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Overwrite `path` with raw wallet query output.
pub fn write_wallet_output(path: &Path, output: &str) -> Result<(), StateError> {
    Ok(write_atomic(path, output.as_bytes())?)
}
