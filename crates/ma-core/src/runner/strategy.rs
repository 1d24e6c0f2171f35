//! Launch strategies: the concrete ways of invoking the external tool.

use super::process::{ProcessRunner, ToolError, ToolOutput};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One way of launching the tool, e.g. `npx -y moltlaunch` or a
/// pre-installed `mltl` binary.
pub trait LaunchStrategy: std::fmt::Debug + Send + Sync {
    /// Short label for logs and reports.
    fn label(&self) -> &str;

    /// Run the tool with `args`.
    ///
    /// `Err` means the strategy could not be started at all. A process
    /// that ran (including one that timed out) returns `Ok`.
    fn attempt(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError>;
}

/// Declarative form of a program-based strategy, as read from config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub label: String,
    pub program: String,
    /// Arguments placed before the tool arguments.
    #[serde(default)]
    pub args: Vec<String>,
}

impl StrategySpec {
    pub fn new(label: impl Into<String>, program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            label: label.into(),
            program: program.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Ephemeral fetch-and-run through `npx -y <package>`.
    pub fn npx(package: &str) -> Self {
        Self::new("npx", "npx", &["-y", package])
    }

    /// Pre-installed binary on the search path.
    pub fn binary(name: &str) -> Self {
        Self::new(name, name, &[])
    }
}

/// Runs `program [leading args] <tool args>` as a child process.
#[derive(Debug, Clone)]
pub struct ProgramStrategy {
    spec: StrategySpec,
    process: ProcessRunner,
}

impl ProgramStrategy {
    pub fn new(spec: StrategySpec, process: ProcessRunner) -> Self {
        Self { spec, process }
    }

    pub fn spec(&self) -> &StrategySpec {
        &self.spec
    }
}

impl LaunchStrategy for ProgramStrategy {
    fn label(&self) -> &str {
        &self.spec.label
    }

    fn attempt(&self, args: &[String], timeout: Duration) -> Result<ToolOutput, ToolError> {
        let full_args: Vec<String> = self
            .spec
            .args
            .iter()
            .chain(args.iter())
            .cloned()
            .collect();
        self.process.run(&self.spec.program, &full_args, timeout)
    }
}
