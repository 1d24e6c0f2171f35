//! Single-process execution with timeout, output cap, and PATH control.
//!
//! This is the layer underneath every launch strategy:
//!
//! - Per-command timeout with SIGTERM → SIGKILL escalation on the whole
//!   process group (wrappers such as `npx` fork their own children)
//! - Output size caps to prevent memory exhaustion
//! - Child `PATH` is a fixed set of directories followed by the inherited one
//! - Program names with shell metacharacters are rejected

use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, error, trace, warn};

/// Default maximum output size per stream in bytes (10MB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Directories searched before the inherited `PATH`.
pub const DEFAULT_PATH_PREFIX: [&str; 2] = ["/usr/local/bin", "/usr/bin"];

/// Grace period between SIGTERM and SIGKILL in milliseconds.
const SIGTERM_GRACE_MS: u64 = 500;

/// Errors that can occur before a process produces any outcome.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("command not found: {0}")]
    CommandNotFound(String),

    #[error("command failed to spawn: {0}")]
    SpawnFailed(String),

    #[error("invalid command path: {0}")]
    InvalidPath(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Output from a process execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Program that was executed.
    pub command: String,

    /// Arguments passed to the program.
    pub args: Vec<String>,

    /// Standard output (may be truncated).
    pub stdout: Vec<u8>,

    /// Standard error (may be truncated).
    pub stderr: Vec<u8>,

    /// Exit code (None when killed by a signal).
    pub exit_code: Option<i32>,

    /// Whether output was truncated.
    pub truncated: bool,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the process was killed for exceeding its timeout.
    pub timed_out: bool,
}

impl ToolOutput {
    /// Get stdout as string (lossy UTF-8 conversion).
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    /// Get stderr as string (lossy UTF-8 conversion).
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Exit code 0 within the timeout.
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

/// Configuration shared by all process executions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Maximum output size per stream in bytes.
    pub max_output_bytes: usize,

    /// Directories placed ahead of the inherited `PATH`.
    pub path_prefix: Vec<PathBuf>,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            path_prefix: DEFAULT_PATH_PREFIX.iter().map(PathBuf::from).collect(),
        }
    }
}

/// Runs one program to completion or timeout.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    config: ProcessConfig,
}

impl ProcessRunner {
    pub fn new(config: ProcessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    /// The `PATH` value handed to children.
    pub fn child_path(&self) -> Result<OsString, ToolError> {
        let inherited = std::env::var_os("PATH").unwrap_or_default();
        let dirs = self
            .config
            .path_prefix
            .iter()
            .cloned()
            .chain(std::env::split_paths(&inherited).filter(|p| !p.as_os_str().is_empty()));
        std::env::join_paths(dirs).map_err(|e| ToolError::InvalidPath(e.to_string()))
    }

    /// Execute `program` with `args`, killing it after `timeout`.
    ///
    /// A timed-out process is not an error: the returned output has
    /// `timed_out` set and whatever was captured before the kill.
    pub fn run(
        &self,
        program: &str,
        args: &[String],
        timeout: Duration,
    ) -> Result<ToolOutput, ToolError> {
        validate_program(program)?;

        let max_output = self.config.max_output_bytes;
        debug!(
            command = %program,
            args = ?args,
            timeout_ms = timeout.as_millis() as u64,
            max_output,
            "running process"
        );

        let mut command = Command::new(program);
        command
            .args(args)
            .env("PATH", self.child_path()?)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let start = Instant::now();
        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(command = %program, "not found on PATH");
                return Err(ToolError::CommandNotFound(program.to_string()));
            }
            Err(e) => {
                error!(command = %program, error = %e, "failed to spawn");
                return Err(ToolError::SpawnFailed(e.to_string()));
            }
        };

        let (stdout, stderr, exit_code, truncated, timed_out) =
            execute_with_timeout(&mut child, timeout, max_output)?;
        let duration = start.elapsed();

        debug!(
            command = %program,
            duration_ms = duration.as_millis() as u64,
            exit_code = ?exit_code,
            timed_out,
            "process finished"
        );

        Ok(ToolOutput {
            command: program.to_string(),
            args: args.to_vec(),
            stdout,
            stderr,
            exit_code,
            truncated,
            duration,
            timed_out,
        })
    }
}

fn validate_program(program: &str) -> Result<(), ToolError> {
    if program.is_empty() {
        return Err(ToolError::InvalidPath("empty program name".to_string()));
    }
    if program.contains(['|', '&', ';', '$', '`', '\n', '\r']) {
        return Err(ToolError::InvalidPath(format!(
            "command contains shell metacharacters: {}",
            program
        )));
    }
    Ok(())
}

/// Execute a child process with timeout and output capture.
#[allow(clippy::type_complexity)]
fn execute_with_timeout(
    child: &mut Child,
    timeout: Duration,
    max_output: usize,
) -> Result<(Vec<u8>, Vec<u8>, Option<i32>, bool, bool), ToolError> {
    // A timeout past the clock's range means no deadline.
    let deadline = Instant::now().checked_add(timeout);
    let mut stdout_buf = Vec::with_capacity(max_output.min(65536));
    let mut stderr_buf = Vec::with_capacity(max_output.min(65536));
    let mut truncated = false;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();
    let mut chunk = vec![0u8; 8192];

    loop {
        if deadline.is_some_and(|d| Instant::now() >= d) {
            warn!(pid = child.id(), "process timed out, sending SIGTERM");
            kill_with_grace(child);
            let status = child.wait().ok();
            return Ok((
                stdout_buf,
                stderr_buf,
                status.and_then(|s| s.code()),
                truncated,
                true,
            ));
        }

        let mut did_read = false;
        if let Some(ref mut out) = stdout {
            if let Ok(n) = try_read_nonblocking(out, &mut chunk) {
                if n > 0 {
                    did_read = true;
                    append_capped(&mut stdout_buf, &chunk[..n], max_output, &mut truncated);
                }
            }
        }
        if let Some(ref mut err) = stderr {
            if let Ok(n) = try_read_nonblocking(err, &mut chunk) {
                if n > 0 {
                    did_read = true;
                    append_capped(&mut stderr_buf, &chunk[..n], max_output, &mut truncated);
                }
            }
        }

        match child.try_wait() {
            Ok(Some(status)) => {
                if let Some(ref mut out) = stdout {
                    let _ = drain_to_limit(out, &mut stdout_buf, max_output, &mut truncated);
                }
                if let Some(ref mut err) = stderr {
                    let _ = drain_to_limit(err, &mut stderr_buf, max_output, &mut truncated);
                }
                let exit_code = status.code();
                trace!(exit_code = ?exit_code, "process exited");
                return Ok((stdout_buf, stderr_buf, exit_code, truncated, false));
            }
            Ok(None) => {
                if !did_read {
                    thread::sleep(Duration::from_millis(10));
                }
            }
            Err(e) => {
                error!(error = %e, "failed to wait for child");
                return Err(ToolError::Io(e));
            }
        }
    }
}

fn append_capped(buf: &mut Vec<u8>, data: &[u8], max: usize, truncated: &mut bool) {
    let space = max.saturating_sub(buf.len());
    if data.len() > space {
        *truncated = true;
    }
    buf.extend_from_slice(&data[..data.len().min(space)]);
}

/// Drain what is immediately available without waiting on grandchildren
/// that may still hold the pipe open.
fn drain_to_limit<R: Read + AsRawFd>(
    stream: &mut R,
    buf: &mut Vec<u8>,
    max: usize,
    truncated: &mut bool,
) -> std::io::Result<()> {
    let mut chunk = vec![0u8; 8192];
    loop {
        if *truncated {
            break;
        }
        match try_read_nonblocking(stream, &mut chunk) {
            Ok(0) => break,
            Ok(n) => append_capped(buf, &chunk[..n], max, truncated),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// SIGTERM the child's process group, then SIGKILL after a grace period.
#[cfg(unix)]
fn kill_with_grace(child: &mut Child) {
    let pgid = child.id() as i32;

    unsafe {
        libc::kill(-pgid, libc::SIGTERM);
    }
    debug!(pgid, "sent SIGTERM to process group");

    thread::sleep(Duration::from_millis(SIGTERM_GRACE_MS));

    match child.try_wait() {
        Ok(Some(_)) => trace!(pgid, "process exited after SIGTERM"),
        Ok(None) => {
            warn!(pgid, "process did not exit after SIGTERM, sending SIGKILL");
            unsafe {
                libc::kill(-pgid, libc::SIGKILL);
            }
        }
        Err(e) => error!(pgid, error = %e, "failed to check process status"),
    }
}

#[cfg(not(unix))]
fn kill_with_grace(child: &mut Child) {
    let _ = child.kill();
}

#[cfg(unix)]
use std::os::unix::io::AsRawFd;

#[cfg(not(unix))]
trait AsRawFd {}
#[cfg(not(unix))]
impl<T> AsRawFd for T {}

/// Read without blocking; `Ok(0)` when nothing is available.
#[cfg(unix)]
fn try_read_nonblocking<R: Read + AsRawFd>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let fd = stream.as_raw_fd();

    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }

    let was_nonblocking = (flags & libc::O_NONBLOCK) != 0;
    if !was_nonblocking {
        let result = unsafe { libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK) };
        if result < 0 {
            return Err(std::io::Error::last_os_error());
        }
    }

    let result = stream.read(buf);

    if !was_nonblocking {
        unsafe {
            libc::fcntl(fd, libc::F_SETFL, flags);
        }
    }

    match result {
        Ok(n) => Ok(n),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(0),
        Err(e) => Err(e),
    }
}

#[cfg(not(unix))]
fn try_read_nonblocking<R: Read>(stream: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    stream.read(buf)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn runner() -> ProcessRunner {
        ProcessRunner::default()
    }

    fn args(a: &[&str]) -> Vec<String> {
        a.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_echo() {
        let out = runner()
            .run("echo", &args(&["hello", "world"]), Duration::from_secs(5))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout_str().trim(), "hello world");
        assert!(!out.truncated);
        assert!(!out.timed_out);
    }

    #[test]
    fn test_stderr_captured() {
        let out = runner()
            .run("sh", &args(&["-c", "echo oops >&2"]), Duration::from_secs(5))
            .unwrap();
        assert!(out.success());
        assert!(out.stderr_str().contains("oops"));
    }

    #[test]
    fn test_nonzero_exit() {
        let out = runner()
            .run("sh", &args(&["-c", "exit 42"]), Duration::from_secs(5))
            .unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, Some(42));
    }

    #[test]
    fn test_command_not_found() {
        let err = runner()
            .run("definitely-not-a-real-tool-xyz", &[], Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, ToolError::CommandNotFound(_)), "got {err:?}");
    }

    #[test]
    fn test_shell_metachar_rejected() {
        let err = runner()
            .run("echo; rm -rf /", &[], Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidPath(_)));
    }

    #[test]
    fn test_timeout_kills_process() {
        let out = runner()
            .run("sleep", &args(&["10"]), Duration::from_millis(100))
            .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
        assert!(out.duration < Duration::from_secs(3));
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let out = runner()
            .run("echo", &args(&["hi"]), Duration::from_secs(i64::MAX as u64))
            .unwrap();
        assert!(!out.timed_out);
        assert_eq!(out.stdout_str(), "hi\n");

        let out = runner().run("echo", &args(&["hi"]), Duration::MAX).unwrap();
        assert!(out.success());
    }

    #[test]
    fn test_output_truncation() {
        let runner = ProcessRunner::new(ProcessConfig {
            max_output_bytes: 100,
            ..ProcessConfig::default()
        });
        let out = runner
            .run("sh", &args(&["-c", "yes | head -n 1000"]), Duration::from_secs(5))
            .unwrap();
        assert!(out.truncated);
        assert!(out.stdout.len() <= 100);
    }

    #[test]
    fn test_child_path_prefix() {
        let runner = ProcessRunner::new(ProcessConfig {
            path_prefix: vec![PathBuf::from("/opt/first"), PathBuf::from("/opt/second")],
            ..ProcessConfig::default()
        });
        let path = runner.child_path().unwrap();
        let dirs: Vec<PathBuf> = std::env::split_paths(&path).collect();
        assert_eq!(dirs[0], PathBuf::from("/opt/first"));
        assert_eq!(dirs[1], PathBuf::from("/opt/second"));
    }

    #[test]
    fn test_child_sees_prefixed_path() {
        let out = runner()
            .run("sh", &args(&["-c", "echo $PATH"]), Duration::from_secs(5))
            .unwrap();
        assert!(out.stdout_str().starts_with("/usr/local/bin:/usr/bin"));
    }

    #[test]
    fn test_config_defaults() {
        let config = ProcessConfig::default();
        assert_eq!(config.max_output_bytes, 10 * 1024 * 1024);
        assert_eq!(
            config.path_prefix,
            vec![PathBuf::from("/usr/local/bin"), PathBuf::from("/usr/bin")]
        );
    }
}
