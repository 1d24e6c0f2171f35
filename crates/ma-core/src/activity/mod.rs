//! Bounded, append-only activity log.
//!
//! The log is a JSON array of [`ActivityEntry`] values shared by every tool
//! that writes to the agent's identity directory. Entries from other writers
//! are rewritten exactly as read, extra fields included. Each [`ActivityLog::record`]
//! reads the current sequence, appends one entry, keeps the newest
//! [`DEFAULT_MAX_ENTRIES`], and writes the whole array back.
//!
//! # Usage
//!
//! ```ignore
//! use ma_core::activity::{ActivityLog, FileActivityStore};
//!
//! let log = ActivityLog::new(FileActivityStore::new("/root/.arwen_identity/activity_log.json"));
//! log.record("moltlaunch", "Wallet checked", None)?;
//! ```

mod lock;
mod store;

pub use store::{ActivityStore, FileActivityStore, MemoryActivityStore};

use crate::fsutil::WriteError;
use ma_common::{ActivityDetails, ActivityEntry};
use std::path::PathBuf;
use thiserror::Error;
use tracing::trace;

/// Entries kept after every write.
pub const DEFAULT_MAX_ENTRIES: usize = 500;

/// Errors that can occur while reading or writing the activity log.
#[derive(Debug, Error)]
pub enum ActivityError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse activity log {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize activity log: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    #[error("activity store lock poisoned")]
    Poisoned,
}

impl From<WriteError> for ActivityError {
    fn from(err: WriteError) -> Self {
        ActivityError::Io {
            path: err.path,
            source: err.source,
        }
    }
}

impl From<ActivityError> for ma_common::Error {
    fn from(err: ActivityError) -> Self {
        match err {
            ActivityError::Io { path, source } => ma_common::Error::Io { path, source },
            other => ma_common::Error::ActivityLog(other.to_string()),
        }
    }
}

/// Activity log over an injected store.
#[derive(Debug)]
pub struct ActivityLog<S: ActivityStore> {
    store: S,
    max_entries: usize,
}

impl<S: ActivityStore> ActivityLog<S> {
    pub fn new(store: S) -> Self {
        Self::with_max_entries(store, DEFAULT_MAX_ENTRIES)
    }

    /// A bound of 0 is raised to 1 so the newest entry is always kept.
    pub fn with_max_entries(store: S, max_entries: usize) -> Self {
        Self {
            store,
            max_entries: max_entries.max(1),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Append one entry stamped now and return it.
    pub fn record(
        &self,
        kind: &str,
        message: &str,
        details: Option<ActivityDetails>,
    ) -> Result<ActivityEntry, ActivityError> {
        self.append(ActivityEntry::new(kind, message).with_details(details))
    }

    /// Append a prepared entry and return it.
    pub fn append(&self, entry: ActivityEntry) -> Result<ActivityEntry, ActivityError> {
        let count = self.store.append_bounded(entry.clone(), self.max_entries)?;
        trace!(kind = %entry.kind, message = %entry.message, count, "activity recorded");
        Ok(entry)
    }

    /// All entries, oldest first.
    pub fn entries(&self) -> Result<Vec<ActivityEntry>, ActivityError> {
        self.store.load()
    }

    /// The newest `n` entries, oldest first.
    pub fn tail(&self, n: usize) -> Result<Vec<ActivityEntry>, ActivityError> {
        let mut entries = self.store.load()?;
        let skip = entries.len().saturating_sub(n);
        entries.drain(..skip);
        Ok(entries)
    }
}
