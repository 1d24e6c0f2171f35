//! molt-autopilot CLI entry point.
//!
//! Runs the autonomous registration sequence against the `mltl` tool and
//! exposes read-only views of the activity log, run state, and resolved
//! configuration.

use clap::{Args, Parser, Subcommand};
use ma_common::{AutopilotPaths, OutputFormat};
use ma_core::activity::{ActivityLog, FileActivityStore};
use ma_core::config::{load_config, ConfigOptions, ResolvedConfig};
use ma_core::exit_codes::ExitCode;
use ma_core::logging::{generate_run_id, init_logging, LogConfig, LogFormat, LogLevel};
use ma_core::orchestrate::Orchestrator;
use ma_core::runner::CommandRunner;
use ma_core::state::read_state;
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, error};

/// Molt Autopilot: registers an agent on moltlaunch and delegates a task
#[derive(Parser, Debug)]
#[command(name = "molt-autopilot")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    global: GlobalOpts,
}

/// Global options available to all commands
#[derive(Args, Debug)]
struct GlobalOpts {
    /// Config file (TOML); falls back to MOLT_AUTOPILOT_CONFIG
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding the shared activity log
    #[arg(long, global = true)]
    identity_dir: Option<PathBuf>,

    /// Directory for wallet output and run state
    #[arg(long, global = true)]
    work_dir: Option<PathBuf>,

    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "human")]
    format: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (quiet mode)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Diagnostic log format on stderr
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check the tool, query the wallet, register, and hire (default)
    Run,

    /// Show the newest activity log entries
    Activity(ActivityArgs),

    /// Show the last completed run
    State,

    /// Show the resolved configuration
    Config,
}

#[derive(Args, Debug)]
struct ActivityArgs {
    /// Number of entries to show
    #[arg(long, short = 'n', default_value_t = 20)]
    limit: usize,
}

fn main() {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = if e.use_stderr() {
                ExitCode::ArgsError.as_i32()
            } else {
                0
            };
            let _ = e.print();
            std::process::exit(code);
        }
    };

    let log_config = LogConfig::from_env(
        LogLevel::from_verbosity(cli.global.verbose, cli.global.quiet),
        cli.global.log_format,
    );
    init_logging(&log_config);

    let exit_code = match dispatch(&cli) {
        Ok(code) => code,
        Err(e) => {
            error!(code = e.code(), error = %e, "command failed");
            report_error(&cli.global, &e);
            ExitCode::from(&e)
        }
    };

    std::process::exit(exit_code.as_i32());
}

fn dispatch(cli: &Cli) -> ma_common::Result<ExitCode> {
    let resolved = load_config(&ConfigOptions {
        config_path: cli.global.config.clone(),
    })?;
    debug!(source = ?resolved.source, path = ?resolved.path, "configuration resolved");

    match cli.command.as_ref().unwrap_or(&Commands::Run) {
        Commands::Run => run_autopilot(&cli.global, resolved),
        Commands::Activity(args) => run_activity(&cli.global, &resolved, args),
        Commands::State => run_state(&cli.global, &resolved),
        Commands::Config => run_config(&cli.global, &resolved),
    }
}

/// Directory precedence: CLI flag, config file, env var, home default.
fn resolve_paths(global: &GlobalOpts, resolved: &ResolvedConfig) -> ma_common::Result<AutopilotPaths> {
    let config = &resolved.config;
    let identity = global
        .identity_dir
        .as_deref()
        .or(config.paths.identity_dir.as_deref());
    let work = global.work_dir.as_deref().or(config.paths.work_dir.as_deref());
    AutopilotPaths::resolve(&config.identity.name, identity, work)
}

fn run_autopilot(global: &GlobalOpts, resolved: ResolvedConfig) -> ma_common::Result<ExitCode> {
    let paths = resolve_paths(global, &resolved)?;
    paths.ensure_dirs()?;

    let config = resolved.config;
    let runner = CommandRunner::from_settings(&config.tool);
    let log = ActivityLog::with_max_entries(
        FileActivityStore::new(paths.activity_log()),
        config.activity.max_entries,
    );
    let orchestrator = Orchestrator::new(runner, log, paths, config, generate_run_id());

    let report = match global.format {
        OutputFormat::Human => {
            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            let report = orchestrator.run(&mut out);
            let _ = out.flush();
            report
        }
        OutputFormat::Json => {
            let stderr = std::io::stderr();
            let mut out = stderr.lock();
            let report = orchestrator.run(&mut out);
            print_json(&serde_json::to_value(&report)?);
            report
        }
    };

    Ok(ExitCode::for_report(&report))
}

fn run_activity(
    global: &GlobalOpts,
    resolved: &ResolvedConfig,
    args: &ActivityArgs,
) -> ma_common::Result<ExitCode> {
    let paths = resolve_paths(global, resolved)?;
    let log = ActivityLog::new(FileActivityStore::new(paths.activity_log()));
    let entries = log.tail(args.limit)?;

    match global.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&entries)?),
        OutputFormat::Human => {
            if entries.is_empty() {
                println!("No activity recorded in {}", paths.activity_log().display());
            }
            for entry in &entries {
                match entry.detail_str("error") {
                    Some(err) => println!(
                        "{} [{}] {} (error: {})",
                        entry.timestamp, entry.kind, entry.message, err
                    ),
                    None => println!("{} [{}] {}", entry.timestamp, entry.kind, entry.message),
                }
            }
        }
    }
    Ok(ExitCode::Completed)
}

fn run_state(global: &GlobalOpts, resolved: &ResolvedConfig) -> ma_common::Result<ExitCode> {
    let paths = resolve_paths(global, resolved)?;
    let state = read_state(&paths.state_file())?;

    match global.format {
        OutputFormat::Json => print_json(&serde_json::to_value(&state)?),
        OutputFormat::Human => match state {
            Some(state) => {
                println!("last_run: {}", state.last_run);
                println!("done: {}", state.done);
            }
            None => println!("No completed run recorded in {}", paths.state_file().display()),
        },
    }
    Ok(ExitCode::Completed)
}

fn run_config(global: &GlobalOpts, resolved: &ResolvedConfig) -> ma_common::Result<ExitCode> {
    match global.format {
        OutputFormat::Json => print_json(&serde_json::to_value(resolved)?),
        OutputFormat::Human => {
            let source = match &resolved.path {
                Some(path) => format!("{:?} ({})", resolved.source, path.display()),
                None => format!("{:?}", resolved.source),
            };
            let body = toml::to_string_pretty(&resolved.config)
                .map_err(|e| ma_common::Error::Config(format!("cannot render config: {e}")))?;
            println!("# source: {source}");
            print!("{body}");
        }
    }
    Ok(ExitCode::Completed)
}

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("error: failed to render JSON: {e}"),
    }
}

fn report_error(global: &GlobalOpts, err: &ma_common::Error) {
    match global.format {
        OutputFormat::Json => print_json(&serde_json::json!({ "error": err.to_json() })),
        OutputFormat::Human => eprintln!("error: {err}"),
    }
}
