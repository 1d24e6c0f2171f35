//! The registration and delegation run.
//!
//! A fixed sequence, not a state machine:
//!
//! 1. Availability probe (`--version`), one install attempt and one re-probe.
//!    Total unavailability is the only fatal outcome.
//! 2. Wallet query; raw output saved on success, always logged as checked.
//! 3. Registration, classified into [`RegistrationOutcome`].
//! 4. Hire request to the configured agent.
//! 5. State record written and completion logged.
//!
//! Every step after the first logs its failure and moves on. Console lines
//! go to the writer passed to [`Orchestrator::run`]; persistent detail goes
//! to the activity log.

pub mod classify;

pub use classify::{
    classify_registration, RegistrationOutcome, ALREADY_REGISTERED_MARKERS,
};

use crate::activity::{ActivityLog, ActivityStore};
use crate::config::AutopilotConfig;
use crate::runner::ToolInvoker;
use crate::state::{write_state, write_wallet_output};
use ma_common::{truncate_chars, ActivityEntry, AutopilotPaths, Error, StateRecord};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::time::Duration;
use tracing::{error, info, info_span, warn};

/// Characters of trimmed wallet output echoed to the console.
pub const WALLET_PREVIEW_CHARS: usize = 80;

/// Characters of error text echoed to the console.
pub const CONSOLE_ERROR_CHARS: usize = 200;

/// Characters of registration error text kept in the activity log.
pub const REGISTRATION_LOG_ERROR_CHARS: usize = 100;

/// Characters of hire error text kept in the activity log.
pub const HIRE_LOG_ERROR_CHARS: usize = 150;

/// Result of a non-classified step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed,
}

impl From<bool> for StepStatus {
    fn from(ok: bool) -> Self {
        if ok {
            StepStatus::Succeeded
        } else {
            StepStatus::Failed
        }
    }
}

/// What happened during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: String,
    pub tool_available: bool,
    pub install_attempted: bool,
    /// Strategy that answered the availability probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet: Option<StepStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<RegistrationOutcome>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hire: Option<StepStatus>,
    pub completed: bool,
    /// Activity log or side-file writes that failed.
    pub write_failures: usize,
}

impl RunReport {
    fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            tool_available: false,
            install_attempted: false,
            strategy: None,
            wallet: None,
            registration: None,
            hire: None,
            completed: false,
            write_failures: 0,
        }
    }

    /// Registration ended registered or already registered.
    pub fn registered(&self) -> bool {
        self.registration
            .is_some_and(RegistrationOutcome::is_success_equivalent)
    }
}

/// Runs the fixed sequence against an injected tool and activity store.
#[derive(Debug)]
pub struct Orchestrator<I: ToolInvoker, S: ActivityStore> {
    invoker: I,
    log: ActivityLog<S>,
    paths: AutopilotPaths,
    config: AutopilotConfig,
    run_id: String,
}

impl<I: ToolInvoker, S: ActivityStore> Orchestrator<I, S> {
    pub fn new(
        invoker: I,
        log: ActivityLog<S>,
        paths: AutopilotPaths,
        config: AutopilotConfig,
        run_id: impl Into<String>,
    ) -> Self {
        Self {
            invoker,
            log,
            paths,
            config,
            run_id: run_id.into(),
        }
    }

    pub fn invoker(&self) -> &I {
        &self.invoker
    }

    pub fn log(&self) -> &ActivityLog<S> {
        &self.log
    }

    pub fn paths(&self) -> &AutopilotPaths {
        &self.paths
    }

    /// Execute the run, printing one short line per step to `out`.
    pub fn run<W: Write>(&self, out: &mut W) -> RunReport {
        let span = info_span!("run", run_id = %self.run_id);
        let _guard = span.enter();

        let mut report = RunReport::new(&self.run_id);
        let package = &self.config.tool.package;
        say(
            out,
            &format!(
                "=== {} {} - AUTONOMOUS ===\n",
                self.config.identity.name.to_uppercase(),
                package.to_uppercase()
            ),
        );

        if !self.check_availability(out, &mut report) {
            return report;
        }
        self.check_wallet(out, &mut report);
        self.register(out, &mut report);
        self.hire(out, &mut report);
        self.finalize(out, &mut report);

        info!(
            registered = report.registered(),
            registration = ?report.registration,
            hire = ?report.hire,
            write_failures = report.write_failures,
            "run completed"
        );
        report
    }

    fn kind(&self) -> &str {
        &self.config.tool.package
    }

    fn hire_kind(&self) -> String {
        format!("{}_hire", self.config.tool.package)
    }

    fn check_availability<W: Write>(&self, out: &mut W, report: &mut RunReport) -> bool {
        let tool = &self.config.tool;
        let version = [String::from("--version")];

        let mut probe = self
            .invoker
            .invoke(&version, Some(secs(tool.probe_timeout_secs)));
        if !probe.succeeded {
            say(out, &format!("Installing {} ({})...", tool.package, self.install_label()));
            report.install_attempted = true;
            let installed = self.invoker.install();
            info!(installed, "install attempt finished, re-probing");
            probe = self
                .invoker
                .invoke(&version, Some(secs(tool.reprobe_timeout_secs)));
        }

        if !probe.succeeded {
            let err = Error::ToolUnavailable {
                tool: tool.name.clone(),
                detail: probe.stderr.clone(),
            };
            error!(code = err.code(), error = %err, "stopping run");
            say(out, &format!("ERROR: {} not available", tool.package));
            self.record(
                report,
                self.kind(),
                &format!("{} CLI not available", tool.name),
                Some(&probe.stderr),
            );
            return false;
        }

        report.tool_available = true;
        report.strategy = probe.strategy.clone();
        say(out, &format!("{} OK\n", tool.name));
        true
    }

    fn check_wallet<W: Write>(&self, out: &mut W, report: &mut RunReport) {
        let outcome = self.invoker.invoke(&[String::from("wallet")], None);
        if outcome.succeeded {
            say(
                out,
                &format!(
                    "Wallet: {}",
                    truncate_chars(outcome.stdout.trim(), WALLET_PREVIEW_CHARS)
                ),
            );
            let path = self.paths.wallet_output();
            if let Err(e) = write_wallet_output(&path, &outcome.stdout) {
                warn!(path = %path.display(), error = %e, "failed to save wallet output");
                report.write_failures += 1;
            }
        }
        report.wallet = Some(outcome.succeeded.into());
        self.record(report, self.kind(), "Wallet checked", None);
    }

    fn register<W: Write>(&self, out: &mut W, report: &mut RunReport) {
        let identity = &self.config.identity;
        let name = &identity.name;
        let package = &self.config.tool.package;
        say(out, &format!("\nRegistering {name}..."));

        let args = [
            "register".to_string(),
            "--name".to_string(),
            name.clone(),
            "--description".to_string(),
            identity.description.clone(),
            "--skills".to_string(),
            identity.skills_arg(),
            "--json".to_string(),
        ];
        let outcome = self
            .invoker
            .invoke(&args, Some(secs(identity.registration_timeout_secs)));
        let classified = classify_registration(outcome.succeeded, &outcome.combined());
        report.registration = Some(classified);

        match classified {
            RegistrationOutcome::Registered => {
                say(out, &format!("{name} registered!"));
                self.record(report, self.kind(), &format!("{name} registered on {package}"), None);
            }
            RegistrationOutcome::AlreadyRegistered => {
                say(out, &format!("{name} already registered"));
                self.record(report, self.kind(), &format!("{name} already on {package}"), None);
            }
            RegistrationOutcome::Failed => {
                step_failed("register", &outcome.stderr);
                say(
                    out,
                    &format!("Register: {}", truncate_chars(&outcome.stderr, CONSOLE_ERROR_CHARS)),
                );
                self.record(
                    report,
                    self.kind(),
                    "Registration attempt",
                    Some(truncate_chars(&outcome.stderr, REGISTRATION_LOG_ERROR_CHARS)),
                );
            }
        }
    }

    fn hire<W: Write>(&self, out: &mut W, report: &mut RunReport) {
        let hire = &self.config.hire;
        say(
            out,
            &format!("\nHiring {} for {}...", hire.agent_name, hire.purpose),
        );

        let args = [
            "hire".to_string(),
            "--agent".to_string(),
            hire.agent_id.clone(),
            "--task".to_string(),
            hire.task.clone(),
        ];
        let outcome = self.invoker.invoke(&args, Some(secs(hire.timeout_secs)));
        report.hire = Some(outcome.succeeded.into());

        if outcome.succeeded {
            say(out, "Hire request sent!");
            say(out, &outcome.stdout);
            self.record(
                report,
                &self.hire_kind(),
                &format!(
                    "Hired {} ({}) for {}",
                    hire.agent_name, hire.agent_id, hire.purpose
                ),
                None,
            );
        } else {
            step_failed("hire", &outcome.stderr);
            say(
                out,
                &format!("Hire: {}", truncate_chars(&outcome.stderr, CONSOLE_ERROR_CHARS)),
            );
            self.record(
                report,
                &self.hire_kind(),
                "Hire attempt",
                Some(truncate_chars(&outcome.stderr, HIRE_LOG_ERROR_CHARS)),
            );
        }
    }

    fn finalize<W: Write>(&self, out: &mut W, report: &mut RunReport) {
        let path = self.paths.state_file();
        if let Err(e) = write_state(&path, &StateRecord::completed_now()) {
            warn!(path = %path.display(), error = %e, "failed to write state record");
            report.write_failures += 1;
        }
        say(out, "\nDone");
        report.completed = true;
        self.record(
            report,
            self.kind(),
            &format!(
                "{} autonomous run completed",
                capitalize(&self.config.tool.package)
            ),
            None,
        );
    }

    /// Append to the activity log; a failed write is reported, not fatal.
    fn record(&self, report: &mut RunReport, kind: &str, message: &str, error: Option<&str>) {
        let mut entry = ActivityEntry::new(kind, message);
        if let Some(error) = error {
            entry = entry.with_error(error);
        }
        if let Err(e) = self.log.append(entry) {
            warn!(kind, message, error = %e, "failed to append activity entry");
            report.write_failures += 1;
        }
    }

    fn install_label(&self) -> String {
        match &self.config.tool.install {
            Some(install) => install.label(&self.config.tool.package),
            None => "no installer configured".to_string(),
        }
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

/// Log a failed step the run continues past.
fn step_failed(operation: &str, stderr: &str) -> Error {
    let err = Error::OperationFailed {
        operation: operation.to_string(),
        detail: truncate_chars(stderr, CONSOLE_ERROR_CHARS).to_string(),
    };
    warn!(code = err.code(), recoverable = err.is_recoverable(), error = %err, "continuing run");
    err
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Console writes are best effort; a closed stdout must not abort the run.
fn say<W: Write>(out: &mut W, line: &str) {
    let _ = writeln!(out, "{line}");
}
