//! External tool invocation through an ordered list of launch strategies.
//!
//! The runner tries each [`LaunchStrategy`] in order and stops at the first
//! one that is found on the search path and exits 0 within the timeout.
//! A strategy that is missing, fails to spawn, or times out is skipped
//! silently; a non-zero exit also falls through to the next strategy.
//!
//! # Example
//!
//! ```ignore
//! use ma_core::runner::{CommandRunnerBuilder, StrategySpec, ToolInvoker};
//! use std::time::Duration;
//!
//! let runner = CommandRunnerBuilder::new("mltl")
//!     .strategy(StrategySpec::npx("moltlaunch"))
//!     .strategy(StrategySpec::binary("mltl"))
//!     .build();
//! let outcome = runner.invoke(&["--version".into()], Some(Duration::from_secs(15)));
//! ```

pub mod process;
pub mod strategy;

pub use process::{ProcessConfig, ProcessRunner, ToolError, ToolOutput};
pub use strategy::{LaunchStrategy, ProgramStrategy, StrategySpec};

use crate::config::ToolSettings;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Default per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 90;

/// Tri-state result of invoking the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
    /// Label of the strategy that produced this outcome, if any ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
}

impl CommandOutcome {
    pub fn success(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: true,
            stdout: stdout.into(),
            stderr: stderr.into(),
            strategy: None,
        }
    }

    pub fn failure(stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            stdout: stdout.into(),
            stderr: stderr.into(),
            strategy: None,
        }
    }

    /// No strategy could run the tool.
    pub fn not_found(tool: &str) -> Self {
        Self::failure("", format!("{tool} not found"))
    }

    fn from_output(strategy: &str, output: &ToolOutput) -> Self {
        Self {
            succeeded: output.success(),
            stdout: output.stdout_str(),
            stderr: output.stderr_str(),
            strategy: Some(strategy.to_string()),
        }
    }

    /// Stdout followed by stderr.
    pub fn combined(&self) -> String {
        format!("{}{}", self.stdout, self.stderr)
    }
}

/// What the orchestration needs from the tool.
pub trait ToolInvoker {
    /// Run the tool with `args`; `None` uses the invoker's default timeout.
    fn invoke(&self, args: &[String], timeout: Option<Duration>) -> CommandOutcome;

    /// Attempt a package-manager install. Returns whether it exited 0.
    fn install(&self) -> bool;
}

/// Package-manager command used when the tool is missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallCommand {
    pub program: String,
    pub args: Vec<String>,
    pub timeout_secs: u64,
}

impl InstallCommand {
    /// `npm i -g <package>`.
    pub fn npm_global(package: &str) -> Self {
        Self {
            program: "npm".to_string(),
            args: vec!["i".to_string(), "-g".to_string(), package.to_string()],
            timeout_secs: 180,
        }
    }

    /// Command line for console output, with the package argument left out
    /// since the surrounding message already names it: `npm i -g`.
    pub fn label(&self, package: &str) -> String {
        std::iter::once(self.program.as_str())
            .chain(
                self.args
                    .iter()
                    .map(String::as_str)
                    .filter(|arg| *arg != package),
            )
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Strategy-iterating tool runner.
#[derive(Debug)]
pub struct CommandRunner {
    tool: String,
    strategies: Vec<Box<dyn LaunchStrategy>>,
    default_timeout: Duration,
    install: Option<InstallCommand>,
    process: ProcessRunner,
}

impl CommandRunner {
    pub fn new(
        tool: impl Into<String>,
        strategies: Vec<Box<dyn LaunchStrategy>>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            tool: tool.into(),
            strategies,
            default_timeout,
            install: None,
            process: ProcessRunner::default(),
        }
    }

    /// Build from the `[tool]` config section.
    pub fn from_settings(settings: &ToolSettings) -> Self {
        let mut builder = CommandRunnerBuilder::new(&settings.name)
            .timeout(Duration::from_secs(settings.default_timeout_secs))
            .process(settings.process_config());
        for spec in &settings.strategies {
            builder = builder.strategy(spec.clone());
        }
        if let Some(install) = &settings.install {
            builder = builder.install(install.clone());
        }
        builder.build()
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn strategy_labels(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.label()).collect()
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Try each strategy in order until one succeeds.
    ///
    /// When every strategy fails, the outcome carries the output of the last
    /// strategy that ran to a non-zero exit. If none ran at all it is
    /// `(false, "", "<tool> not found")`.
    #[instrument(skip(self, args), fields(tool = %self.tool, op = args.first().map(String::as_str).unwrap_or("")))]
    pub fn run(&self, args: &[String], timeout: Option<Duration>) -> CommandOutcome {
        let timeout = timeout.unwrap_or(self.default_timeout);
        let mut last_completed: Option<CommandOutcome> = None;

        for strategy in &self.strategies {
            match strategy.attempt(args, timeout) {
                Ok(output) if output.timed_out => {
                    debug!(
                        strategy = strategy.label(),
                        timeout_ms = timeout.as_millis() as u64,
                        "strategy timed out, trying next"
                    );
                }
                Ok(output) if output.success() => {
                    info!(
                        strategy = strategy.label(),
                        duration_ms = output.duration.as_millis() as u64,
                        "tool invocation succeeded"
                    );
                    return CommandOutcome::from_output(strategy.label(), &output);
                }
                Ok(output) => {
                    debug!(
                        strategy = strategy.label(),
                        exit_code = ?output.exit_code,
                        "strategy exited non-zero, trying next"
                    );
                    last_completed = Some(CommandOutcome::from_output(strategy.label(), &output));
                }
                Err(e) => {
                    debug!(strategy = strategy.label(), error = %e, "strategy unavailable");
                }
            }
        }

        match last_completed {
            Some(outcome) => outcome,
            None => {
                warn!(tool = %self.tool, "no launch strategy could run the tool");
                CommandOutcome::not_found(&self.tool)
            }
        }
    }
}

impl ToolInvoker for CommandRunner {
    fn invoke(&self, args: &[String], timeout: Option<Duration>) -> CommandOutcome {
        self.run(args, timeout)
    }

    fn install(&self) -> bool {
        let Some(install) = &self.install else {
            debug!("no install command configured");
            return false;
        };
        info!(program = %install.program, args = ?install.args, "installing tool");
        match self.process.run(
            &install.program,
            &install.args,
            Duration::from_secs(install.timeout_secs),
        ) {
            Ok(output) => {
                let ok = output.success();
                info!(exit_code = ?output.exit_code, timed_out = output.timed_out, ok, "install finished");
                ok
            }
            Err(e) => {
                warn!(error = %e, "install command could not run");
                false
            }
        }
    }
}

/// Builder for a [`CommandRunner`] with program strategies.
#[derive(Debug)]
pub struct CommandRunnerBuilder {
    tool: String,
    specs: Vec<StrategySpec>,
    timeout: Duration,
    process: ProcessConfig,
    install: Option<InstallCommand>,
}

impl CommandRunnerBuilder {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            specs: Vec::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            process: ProcessConfig::default(),
            install: None,
        }
    }

    /// Append a strategy; order of calls is the order of attempts.
    pub fn strategy(mut self, spec: StrategySpec) -> Self {
        self.specs.push(spec);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn process(mut self, config: ProcessConfig) -> Self {
        self.process = config;
        self
    }

    pub fn install(mut self, install: InstallCommand) -> Self {
        self.install = Some(install);
        self
    }

    pub fn build(self) -> CommandRunner {
        let process = ProcessRunner::new(self.process);
        let strategies = self
            .specs
            .into_iter()
            .map(|spec| Box::new(ProgramStrategy::new(spec, process.clone())) as Box<dyn LaunchStrategy>)
            .collect();
        CommandRunner {
            tool: self.tool,
            strategies,
            default_timeout: self.timeout,
            install: self.install,
            process,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Debug)]
    enum Scripted {
        Missing,
        Exit(i32, &'static str, &'static str),
        TimedOut,
    }

    #[derive(Debug)]
    struct FakeStrategy {
        label: &'static str,
        result: Scripted,
        calls: Arc<AtomicUsize>,
    }

    impl FakeStrategy {
        fn boxed(label: &'static str, result: Scripted, calls: &Arc<AtomicUsize>) -> Box<dyn LaunchStrategy> {
            Box::new(Self {
                label,
                result,
                calls: Arc::clone(calls),
            })
        }
    }

    impl LaunchStrategy for FakeStrategy {
        fn label(&self) -> &str {
            self.label
        }

        fn attempt(&self, args: &[String], _timeout: Duration) -> Result<ToolOutput, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let output = |code: Option<i32>, out: &str, err: &str, timed_out: bool| ToolOutput {
                command: self.label.to_string(),
                args: args.to_vec(),
                stdout: out.as_bytes().to_vec(),
                stderr: err.as_bytes().to_vec(),
                exit_code: code,
                truncated: false,
                duration: Duration::from_millis(1),
                timed_out,
            };
            match self.result {
                Scripted::Missing => Err(ToolError::CommandNotFound(self.label.to_string())),
                Scripted::Exit(code, out, err) => Ok(output(Some(code), out, err, false)),
                Scripted::TimedOut => Ok(output(None, "partial", "", true)),
            }
        }
    }

    fn version() -> Vec<String> {
        vec!["--version".to_string()]
    }

    #[test]
    fn test_first_success_wins() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = CommandRunner::new(
            "mltl",
            vec![
                FakeStrategy::boxed("npx", Scripted::Exit(0, "1.2.3\n", ""), &calls),
                FakeStrategy::boxed("mltl", Scripted::Exit(0, "other", ""), &calls),
            ],
            Duration::from_secs(90),
        );
        let outcome = runner.run(&version(), None);
        assert!(outcome.succeeded);
        assert_eq!(outcome.stdout, "1.2.3\n");
        assert_eq!(outcome.strategy.as_deref(), Some("npx"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_falls_through() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = CommandRunner::new(
            "mltl",
            vec![
                FakeStrategy::boxed("npx", Scripted::Missing, &calls),
                FakeStrategy::boxed("mltl", Scripted::Exit(0, "ok", ""), &calls),
            ],
            Duration::from_secs(90),
        );
        let outcome = runner.run(&version(), None);
        assert!(outcome.succeeded);
        assert_eq!(outcome.strategy.as_deref(), Some("mltl"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_timeout_treated_as_missing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = CommandRunner::new(
            "mltl",
            vec![
                FakeStrategy::boxed("npx", Scripted::TimedOut, &calls),
                FakeStrategy::boxed("mltl", Scripted::Missing, &calls),
            ],
            Duration::from_secs(90),
        );
        let outcome = runner.run(&version(), Some(Duration::from_secs(1)));
        assert_eq!(outcome, CommandOutcome::not_found("mltl"));
        assert_eq!(outcome.stdout, "");
        assert_eq!(outcome.stderr, "mltl not found");
    }

    #[test]
    fn test_nonzero_falls_through_and_keeps_output() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = CommandRunner::new(
            "mltl",
            vec![
                FakeStrategy::boxed("npx", Scripted::Exit(1, "", "Agent already exists"), &calls),
                FakeStrategy::boxed("mltl", Scripted::Missing, &calls),
            ],
            Duration::from_secs(90),
        );
        let outcome = runner.run(&version(), None);
        assert!(!outcome.succeeded);
        assert_eq!(outcome.stderr, "Agent already exists");
        assert_eq!(outcome.strategy.as_deref(), Some("npx"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_strategies_fail_immediately() {
        let runner = CommandRunner::new("mltl", Vec::new(), Duration::from_secs(90));
        assert_eq!(runner.run(&version(), None), CommandOutcome::not_found("mltl"));
    }

    #[test]
    fn test_combined_text() {
        let outcome = CommandOutcome::failure("out ", "err");
        assert_eq!(outcome.combined(), "out err");
    }

    #[test]
    fn test_install_without_command_is_false() {
        let runner = CommandRunner::new("mltl", Vec::new(), Duration::from_secs(90));
        assert!(!runner.install());
    }

    #[cfg(unix)]
    #[test]
    fn test_builder_with_real_processes() {
        let runner = CommandRunnerBuilder::new("fake-tool")
            .strategy(StrategySpec::binary("definitely-not-a-real-tool-xyz"))
            .strategy(StrategySpec::new("sh", "sh", &["-c", "echo from-sh", "sh"]))
            .timeout(Duration::from_secs(5))
            .build();
        assert_eq!(
            runner.strategy_labels(),
            vec!["definitely-not-a-real-tool-xyz", "sh"]
        );
        let outcome = runner.run(&["ignored".to_string()], None);
        assert!(outcome.succeeded);
        assert_eq!(outcome.stdout.trim(), "from-sh");
    }

    #[cfg(unix)]
    #[test]
    fn test_install_runs_command() {
        let runner = CommandRunnerBuilder::new("fake-tool")
            .install(InstallCommand {
                program: "true".to_string(),
                args: Vec::new(),
                timeout_secs: 5,
            })
            .build();
        assert!(runner.install());
    }

    #[test]
    fn test_install_label_leaves_out_package() {
        let npm = InstallCommand::npm_global("moltlaunch");
        assert_eq!(npm.label("moltlaunch"), "npm i -g");

        let custom = InstallCommand {
            program: "brew".to_string(),
            args: vec!["install".to_string(), "mltl".to_string()],
            timeout_secs: 60,
        };
        assert_eq!(custom.label("moltlaunch"), "brew install mltl");
    }
}
