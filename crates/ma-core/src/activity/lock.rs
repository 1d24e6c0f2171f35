//! Advisory file lock serializing activity log writers.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use super::ActivityError;

/// Exclusive `flock` held for the lifetime of the guard.
pub(crate) struct LogLock {
    file: File,
}

impl LogLock {
    /// Block until the exclusive lock on `path` is acquired.
    pub(crate) fn acquire(path: &Path) -> Result<Self, ActivityError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false) // advisory lock only, contents unused
            .open(path)
            .map_err(|e| io_err(path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            let fd = file.as_raw_fd();
            loop {
                let result = unsafe { libc::flock(fd, libc::LOCK_EX) };
                if result == 0 {
                    break;
                }
                let err = std::io::Error::last_os_error();
                if err.kind() != std::io::ErrorKind::Interrupted {
                    return Err(io_err(path, err));
                }
            }
        }

        Ok(Self { file })
    }
}

impl Drop for LogLock {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            use std::os::unix::io::AsRawFd;
            unsafe {
                libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
            }
        }
        // The lock file is never removed.
    }
}

fn io_err(path: &Path, source: std::io::Error) -> ActivityError {
    ActivityError::Io {
        path: PathBuf::from(path),
        source,
    }
}
