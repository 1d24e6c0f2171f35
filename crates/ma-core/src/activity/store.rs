//! Backing stores for the activity log.

use super::lock::LogLock;
use super::ActivityError;
use crate::fsutil::write_atomic;
use ma_common::ActivityEntry;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, trace};

/// Durable, ordered sequence of activity entries.
pub trait ActivityStore {
    /// All entries, oldest first. A store that does not exist yet is empty.
    fn load(&self) -> Result<Vec<ActivityEntry>, ActivityError>;

    /// Append `entry`, keep only the newest `max_entries`, and persist.
    ///
    /// Returns the number of entries now stored.
    fn append_bounded(&self, entry: ActivityEntry, max_entries: usize)
        -> Result<usize, ActivityError>;
}

/// Keep the newest `max_entries`, dropping from the front.
pub(crate) fn bound<T>(entries: &mut Vec<T>, max_entries: usize) {
    if entries.len() > max_entries {
        let excess = entries.len() - max_entries;
        entries.drain(..excess);
    }
}

/// JSON array on disk, shared with other tools writing the same identity log.
///
/// Each append holds an exclusive lock on `<file>.lock` across the
/// read-modify-write and replaces the file through a rename.
#[derive(Debug, Clone)]
pub struct FileActivityStore {
    path: PathBuf,
}

impl FileActivityStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "activity_log.json".into());
        name.push(".lock");
        self.path.with_file_name(name)
    }

    /// Raw array elements, so fields written by other tools survive a rewrite.
    fn read_raw(&self) -> Result<Vec<Value>, ActivityError> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                trace!(path = %self.path.display(), "activity log absent, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(ActivityError::Io {
                    path: self.path.clone(),
                    source: e,
                })
            }
        };
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&content).map_err(|e| ActivityError::Parse {
            path: self.path.clone(),
            source: e,
        })
    }

    fn write_raw(&self, entries: &[Value]) -> Result<(), ActivityError> {
        let content =
            serde_json::to_vec_pretty(entries).map_err(|e| ActivityError::Serialization { source: e })?;
        Ok(write_atomic(&self.path, &content)?)
    }
}

impl ActivityStore for FileActivityStore {
    fn load(&self) -> Result<Vec<ActivityEntry>, ActivityError> {
        Ok(self.read_raw()?.iter().map(ActivityEntry::from_value).collect())
    }

    fn append_bounded(
        &self,
        entry: ActivityEntry,
        max_entries: usize,
    ) -> Result<usize, ActivityError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ActivityError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let entry =
            serde_json::to_value(&entry).map_err(|e| ActivityError::Serialization { source: e })?;
        let _lock = LogLock::acquire(&self.lock_path())?;

        let mut entries = self.read_raw()?;
        entries.push(entry);
        bound(&mut entries, max_entries);
        self.write_raw(&entries)?;

        debug!(path = %self.path.display(), count = entries.len(), "activity log written");
        Ok(entries.len())
    }
}

/// In-process store for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryActivityStore {
    entries: Mutex<Vec<ActivityEntry>>,
}

impl MemoryActivityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with existing entries.
    pub fn with_entries(entries: Vec<ActivityEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }
}

impl ActivityStore for MemoryActivityStore {
    fn load(&self) -> Result<Vec<ActivityEntry>, ActivityError> {
        let entries = self.entries.lock().map_err(|_| ActivityError::Poisoned)?;
        Ok(entries.clone())
    }

    fn append_bounded(
        &self,
        entry: ActivityEntry,
        max_entries: usize,
    ) -> Result<usize, ActivityError> {
        let mut entries = self.entries.lock().map_err(|_| ActivityError::Poisoned)?;
        entries.push(entry);
        bound(&mut entries, max_entries);
        Ok(entries.len())
    }
}
