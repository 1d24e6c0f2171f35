//! Whole-file replacement through a temp file and rename.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Failed step of an atomic write, with the path it touched.
#[derive(Debug, Error)]
#[error("I/O error at {path}: {source}")]
pub(crate) struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Replace `path` with `content`, creating parent directories as needed.
///
/// Readers see either the old file or the new one, never a partial write.
/// Temp names carry the pid and a per-process sequence number so concurrent
/// writers to the same path never share a temp file.
pub(crate) fn write_atomic(path: &Path, content: &[u8]) -> Result<(), WriteError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| WriteError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    let file_name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("output.json");
    let tmp_path = path.with_file_name(format!(
        "{}.tmp.{}.{}",
        file_name,
        std::process::id(),
        TMP_SEQ.fetch_add(1, Ordering::Relaxed)
    ));
    {
        let mut file = std::fs::File::create(&tmp_path).map_err(|e| WriteError {
            path: tmp_path.clone(),
            source: e,
        })?;
        if let Err(e) = file.write_all(content) {
            let _ = std::fs::remove_file(&tmp_path);
            return Err(WriteError {
                path: tmp_path,
                source: e,
            });
        }
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp_path);
        WriteError {
            path: path.to_path_buf(),
            source: e,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn leftovers(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|name| name.contains(".tmp."))
            .collect()
    }

    #[test]
    fn test_creates_parent_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a/b/state.json");
        write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn test_replaces_existing_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("wallet_out.txt");
        write_atomic(&path, b"a much longer first version").unwrap();
        write_atomic(&path, b"short").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "short");
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_rename_failure_cleans_up_temp() {
        let dir = tempdir().unwrap();
        // A directory in the way makes the rename fail.
        let path = dir.path().join("state.json");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), "x").unwrap();

        let err = write_atomic(&path, b"{}").unwrap_err();
        assert_eq!(err.path, path);
        assert!(leftovers(dir.path()).is_empty());
    }

    #[test]
    fn test_concurrent_writers_in_one_process() {
        let dir = tempdir().unwrap();
        let path = Arc::new(dir.path().join("state.json"));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = Arc::clone(&path);
                std::thread::spawn(move || {
                    for _ in 0..20 {
                        write_atomic(&path, format!("writer {i}").as_bytes()).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let content = std::fs::read_to_string(&*path).unwrap();
        assert!(content.starts_with("writer "));
        assert!(leftovers(dir.path()).is_empty());
    }
}
