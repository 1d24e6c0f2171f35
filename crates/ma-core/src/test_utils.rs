//! Scripted tool invoker for testing.
//!
//! [`ScriptedInvoker`] stands in for the real `mltl` runner. Outcomes are
//! queued per operation (the first argument: `--version`, `wallet`,
//! `register`, `hire`); an operation with an empty queue gets the default
//! outcome. Every call is recorded for later assertions.
//!
//! # Example
//!
//! ```ignore
//! use ma_core::runner::CommandOutcome;
//! use ma_core::test_utils::ScriptedInvoker;
//!
//! let invoker = ScriptedInvoker::new()
//!     .on("--version", CommandOutcome::success("1.0.0", ""))
//!     .on("wallet", CommandOutcome::success("balance: 10", ""))
//!     .on("register", CommandOutcome::failure("", "Agent already registered"));
//! ```

use crate::runner::{CommandOutcome, ToolInvoker};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// One recorded invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub args: Vec<String>,
    pub timeout: Option<Duration>,
}

impl RecordedCall {
    pub fn operation(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug)]
pub struct ScriptedInvoker {
    scripts: RefCell<HashMap<String, VecDeque<CommandOutcome>>>,
    default: CommandOutcome,
    calls: RefCell<Vec<RecordedCall>>,
    install_result: bool,
    installs: Cell<usize>,
}

impl Default for ScriptedInvoker {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedInvoker {
    /// Every operation succeeds with empty output unless scripted.
    pub fn new() -> Self {
        Self {
            scripts: RefCell::new(HashMap::new()),
            default: CommandOutcome::success("", ""),
            calls: RefCell::new(Vec::new()),
            install_result: false,
            installs: Cell::new(0),
        }
    }

    /// A tool no strategy can launch.
    pub fn unavailable(tool: &str) -> Self {
        Self::new().default_outcome(CommandOutcome::not_found(tool))
    }

    /// Queue an outcome for `operation`; repeated calls queue in order.
    pub fn on(self, operation: &str, outcome: CommandOutcome) -> Self {
        self.scripts
            .borrow_mut()
            .entry(operation.to_string())
            .or_default()
            .push_back(outcome);
        self
    }

    pub fn default_outcome(mut self, outcome: CommandOutcome) -> Self {
        self.default = outcome;
        self
    }

    pub fn install_result(mut self, ok: bool) -> Self {
        self.install_result = ok;
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Recorded operations in call order.
    pub fn operations(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .map(|c| c.operation().to_string())
            .collect()
    }

    pub fn calls_for(&self, operation: &str) -> Vec<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.operation() == operation)
            .cloned()
            .collect()
    }

    pub fn install_count(&self) -> usize {
        self.installs.get()
    }
}

impl ToolInvoker for ScriptedInvoker {
    fn invoke(&self, args: &[String], timeout: Option<Duration>) -> CommandOutcome {
        self.calls.borrow_mut().push(RecordedCall {
            args: args.to_vec(),
            timeout,
        });
        let operation = args.first().map(String::as_str).unwrap_or("");
        self.scripts
            .borrow_mut()
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.clone())
    }

    fn install(&self) -> bool {
        self.installs.set(self.installs.get() + 1);
        self.install_result
    }
}
