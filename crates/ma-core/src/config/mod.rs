//! Configuration loading and validation for ma-core.
//!
//! This module handles:
//! - The TOML config file (`config.toml`) and its built-in defaults
//! - Config resolution order (CLI > env > XDG > defaults)
//! - Semantic validation (non-zero timeouts, non-empty identity)
//!
//! Every field has a default, so an empty or partial file is valid.

pub mod validation;

pub use validation::{validate_config, ValidationError, MAX_TIMEOUT_SECS};

use crate::activity::DEFAULT_MAX_ENTRIES;
use crate::runner::process::{DEFAULT_MAX_OUTPUT_BYTES, DEFAULT_PATH_PREFIX};
use crate::runner::{InstallCommand, ProcessConfig, StrategySpec, DEFAULT_TIMEOUT_SECS};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Default XDG config directory name.
const CONFIG_DIR_NAME: &str = "molt_autopilot";

/// Config filename inside the config directory.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "MOLT_AUTOPILOT_CONFIG";

/// Errors that can occur during config loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("semantic validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl From<ConfigError> for ma_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation(e) => ma_common::Error::InvalidConfig(e.to_string()),
            other => ma_common::Error::Config(other.to_string()),
        }
    }
}

/// Full run configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct AutopilotConfig {
    pub tool: ToolSettings,
    pub paths: PathSettings,
    pub activity: ActivitySettings,
    pub identity: IdentitySettings,
    pub hire: HireSettings,
}

/// How the external CLI is located and launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSettings {
    /// Name used in messages, e.g. `mltl not found`.
    pub name: String,
    /// Package name fetched by `npx` and installed by npm.
    pub package: String,
    /// Launch strategies, tried in order.
    pub strategies: Vec<StrategySpec>,
    pub default_timeout_secs: u64,
    /// Timeout of the first `--version` probe.
    pub probe_timeout_secs: u64,
    /// Timeout of the probe after an install attempt.
    pub reprobe_timeout_secs: u64,
    pub max_output_bytes: usize,
    /// Directories placed ahead of the inherited `PATH`.
    pub path_prefix: Vec<PathBuf>,
    /// Install fallback; `None` disables it.
    pub install: Option<InstallCommand>,
}

impl Default for ToolSettings {
    fn default() -> Self {
        let package = "moltlaunch";
        Self {
            name: "mltl".to_string(),
            package: package.to_string(),
            strategies: vec![StrategySpec::npx(package), StrategySpec::binary("mltl")],
            default_timeout_secs: DEFAULT_TIMEOUT_SECS,
            probe_timeout_secs: 15,
            reprobe_timeout_secs: 10,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            path_prefix: DEFAULT_PATH_PREFIX.iter().map(PathBuf::from).collect(),
            install: Some(InstallCommand::npm_global(package)),
        }
    }
}

impl ToolSettings {
    pub fn process_config(&self) -> ProcessConfig {
        ProcessConfig {
            max_output_bytes: self.max_output_bytes,
            path_prefix: self.path_prefix.clone(),
        }
    }
}

/// Directory overrides; unset fields fall back to env vars and home defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct PathSettings {
    pub identity_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ActivitySettings {
    /// Entries kept after each write.
    pub max_entries: usize,
}

impl Default for ActivitySettings {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Identity payload submitted by `register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentitySettings {
    pub name: String,
    pub description: String,
    pub skills: Vec<String>,
    pub registration_timeout_secs: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            name: "Arwen".to_string(),
            description:
                "Autonomous AI agent. Full-stack, web browsing, crypto, OpenClaw. Evolving."
                    .to_string(),
            skills: ["code", "research", "automation", "crypto", "web-browsing", "openclaw"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            registration_timeout_secs: 120,
        }
    }
}

impl IdentitySettings {
    /// Skills as the comma-joined `--skills` value.
    pub fn skills_arg(&self) -> String {
        self.skills.join(",")
    }
}

/// Task delegated through `hire`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HireSettings {
    /// Target agent identifier passed to `--agent`.
    pub agent_id: String,
    /// Display name of the hired agent.
    pub agent_name: String,
    /// Short purpose used in console and log messages.
    pub purpose: String,
    /// Natural-language task passed to `--task`.
    pub task: String,
    pub timeout_secs: u64,
}

impl Default for HireSettings {
    fn default() -> Self {
        Self {
            agent_id: "0x3850".to_string(),
            agent_name: "Connie".to_string(),
            purpose: "OpenClaw web skill".to_string(),
            task: concat!(
                "Build OpenClaw skill for Arwen (autonomous AI on server). ",
                "Enable web research: search, browse, extract links. ",
                "Arwen has Python web_browser.py. Deliver working skill code."
            )
            .to_string(),
            timeout_secs: 30,
        }
    }
}

/// Where the loaded configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    CliFlag,
    EnvVar,
    XdgConfig,
    Default,
}

/// Loaded configuration with provenance.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    pub config: AutopilotConfig,
    pub source: ConfigSource,
    pub path: Option<PathBuf>,
}

/// Configuration resolution options.
#[derive(Debug, Default)]
pub struct ConfigOptions {
    /// Explicit config file (highest priority).
    pub config_path: Option<PathBuf>,
}

/// Load configuration with the standard resolution order.
///
/// Resolution order (highest to lowest priority):
/// 1. Explicit CLI flag (via ConfigOptions)
/// 2. Environment variable (MOLT_AUTOPILOT_CONFIG)
/// 3. XDG config home (~/.config/molt_autopilot/config.toml), if present
/// 4. Built-in defaults
///
/// Explicit paths from 1 and 2 must exist.
pub fn load_config(options: &ConfigOptions) -> Result<ResolvedConfig, ConfigError> {
    let (path, source) = match resolve_config_path(options) {
        Some(found) => found,
        None => {
            debug!("no config file, using defaults");
            return Ok(ResolvedConfig {
                config: AutopilotConfig::default(),
                source: ConfigSource::Default,
                path: None,
            });
        }
    };

    let config = load_config_file(&path)?;
    debug!(path = %path.display(), ?source, "config loaded");
    Ok(ResolvedConfig {
        config,
        source,
        path: Some(path),
    })
}

fn resolve_config_path(options: &ConfigOptions) -> Option<(PathBuf, ConfigSource)> {
    if let Some(path) = &options.config_path {
        return Some((path.clone(), ConfigSource::CliFlag));
    }

    if let Ok(path) = std::env::var(CONFIG_ENV) {
        if !path.is_empty() {
            return Some((PathBuf::from(path), ConfigSource::EnvVar));
        }
    }

    let xdg_config = std::env::var("XDG_CONFIG_HOME")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    let path = xdg_config.join(CONFIG_DIR_NAME).join(CONFIG_FILENAME);
    path.exists().then_some((path, ConfigSource::XdgConfig))
}

/// Parse and validate a single config file.
pub fn load_config_file(path: &Path) -> Result<AutopilotConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound {
                path: path.to_path_buf(),
            }
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })?;
    let config = parse_config(&content).map_err(|e| match e {
        ConfigError::Parse { source, .. } => ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })?;
    Ok(config)
}

/// Parse and validate config text.
pub fn parse_config(content: &str) -> Result<AutopilotConfig, ConfigError> {
    let config: AutopilotConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: PathBuf::new(),
        source: e,
    })?;
    validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = AutopilotConfig::default();
        assert_eq!(config.tool.name, "mltl");
        assert_eq!(config.tool.default_timeout_secs, 90);
        assert_eq!(config.tool.probe_timeout_secs, 15);
        assert_eq!(config.tool.reprobe_timeout_secs, 10);
        assert_eq!(config.tool.strategies.len(), 2);
        assert_eq!(config.tool.strategies[0].program, "npx");
        assert_eq!(config.tool.strategies[1].program, "mltl");
        assert_eq!(
            config.tool.install.as_ref().map(|i| i.timeout_secs),
            Some(180)
        );
        assert_eq!(config.activity.max_entries, 500);
        assert_eq!(config.identity.name, "Arwen");
        assert_eq!(config.identity.registration_timeout_secs, 120);
        assert_eq!(
            config.identity.skills_arg(),
            "code,research,automation,crypto,web-browsing,openclaw"
        );
        assert_eq!(config.hire.agent_id, "0x3850");
        assert_eq!(config.hire.timeout_secs, 30);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_file_is_defaults() {
        assert_eq!(parse_config("").unwrap(), AutopilotConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let config = parse_config(
            r#"
            [identity]
            name = "Nova"
            skills = ["rust"]

            [hire]
            agent_id = "0xabcd"
            timeout_secs = 45

            [[tool.strategies]]
            label = "local"
            program = "/opt/mltl/bin/mltl"
            "#,
        )
        .unwrap();
        assert_eq!(config.identity.name, "Nova");
        assert_eq!(config.identity.skills_arg(), "rust");
        assert_eq!(config.hire.agent_id, "0xabcd");
        assert_eq!(config.hire.timeout_secs, 45);
        assert_eq!(config.hire.agent_name, "Connie");
        assert_eq!(config.tool.strategies.len(), 1);
        assert!(config.tool.strategies[0].args.is_empty());
        assert_eq!(config.tool.default_timeout_secs, 90);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let err = parse_config("[tool]\nnmae = \"x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_validation_runs_on_parse() {
        let err = parse_config("[hire]\ntimeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_huge_timeout_rejected_on_parse() {
        let err = parse_config("[tool]\ndefault_timeout_secs = 9223372036854775807\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Validation(ValidationError::TooLarge {
                field: "tool.default_timeout_secs",
                ..
            })
        ));
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = tempdir().unwrap();
        let options = ConfigOptions {
            config_path: Some(dir.path().join("missing.toml")),
        };
        assert!(matches!(
            load_config(&options),
            Err(ConfigError::NotFound { .. })
        ));
    }

    #[test]
    fn test_explicit_path_loaded() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[activity]\nmax_entries = 50\n").unwrap();
        let resolved = load_config(&ConfigOptions {
            config_path: Some(path.clone()),
        })
        .unwrap();
        assert_eq!(resolved.source, ConfigSource::CliFlag);
        assert_eq!(resolved.path, Some(path));
        assert_eq!(resolved.config.activity.max_entries, 50);
    }

    #[test]
    fn test_parse_error_carries_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[tool\n").unwrap();
        match load_config_file(&path) {
            Err(ConfigError::Parse { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_serializes_back_to_toml() {
        let text = toml::to_string(&AutopilotConfig::default()).unwrap();
        assert_eq!(parse_config(&text).unwrap(), AutopilotConfig::default());
    }
}
