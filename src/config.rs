//! Configuration for the checkpoint engine and session tuning.
//!
//! Values come from an optional TOML file (`--config` or `CKPT_RUN_CONFIG`)
//! layered over built-in defaults, then launch-mode CLI overrides.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::{CONFIG_ENV_VAR, DEFAULT_DIR_PREFIX};
use crate::{Result, RunError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub engine: EngineConfig,
    pub session: SessionConfig,
}

/// Executables of the external checkpoint engine.
///
/// Each entry is looked up on `PATH` unless it contains a path separator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub coordinator: String,
    pub launcher: String,
    pub command: String,
    /// Name of the restart artifact the engine writes into the checkpoint directory
    pub restart_script: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            coordinator: "dmtcp_coordinator".to_string(),
            launcher: "dmtcp_launch".to_string(),
            command: "dmtcp_command".to_string(),
            restart_script: "dmtcp_restart_script.sh".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Leading component of launch-mode directory names
    pub prefix: String,
    /// Parent of launch-mode checkpoint directories
    pub base_dir: PathBuf,
    pub port_timeout_secs: u64,
    pub poll_interval_ms: u64,
    /// How long to wait for the child after interrupting it before killing it
    pub terminate_grace_ms: u64,
    /// Periodic checkpoint interval handed to the launcher; 0 disables it
    pub checkpoint_interval_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_DIR_PREFIX.to_string(),
            base_dir: PathBuf::from("."),
            port_timeout_secs: 30,
            poll_interval_ms: 100,
            terminate_grace_ms: 2000,
            checkpoint_interval_secs: 0,
        }
    }
}

impl SessionConfig {
    pub fn port_timeout(&self) -> Duration {
        Duration::from_secs(self.port_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    pub fn checkpoint_interval(&self) -> Option<u64> {
        (self.checkpoint_interval_secs > 0).then_some(self.checkpoint_interval_secs)
    }
}

/// Launch-mode values given on the command line.
#[derive(Debug, Clone, Default)]
pub struct LaunchOverrides {
    pub prefix: Option<String>,
    pub base_dir: Option<PathBuf>,
    pub interval: Option<u64>,
}

impl Config {
    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an explicit path, else from `CKPT_RUN_CONFIG`, else defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        match explicit.map(Path::to_path_buf).or(from_env) {
            Some(path) => Self::from_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|err| {
            RunError::Config(format!("cannot read {}: {err}", path.display()))
        })?;
        Self::from_toml_str(&raw).map_err(|err| match err {
            RunError::Config(msg) => RunError::Config(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    pub fn apply_overrides(&mut self, overrides: LaunchOverrides) -> Result<()> {
        if let Some(prefix) = overrides.prefix {
            self.session.prefix = prefix;
        }
        if let Some(base_dir) = overrides.base_dir {
            self.session.base_dir = base_dir;
        }
        if let Some(interval) = overrides.interval {
            self.session.checkpoint_interval_secs = interval;
        }
        self.validate()
    }

    pub fn validate(&self) -> Result<()> {
        let session = &self.session;
        if session.prefix.is_empty() || session.prefix.contains('/') {
            return Err(RunError::Config(format!(
                "prefix must be a non-empty name without '/': {:?}",
                session.prefix
            )));
        }
        if session.port_timeout_secs == 0 {
            return Err(RunError::Config("port_timeout_secs must be positive".into()));
        }
        if session.poll_interval_ms == 0 {
            return Err(RunError::Config("poll_interval_ms must be positive".into()));
        }

        let engine = &self.engine;
        for (key, value) in [
            ("coordinator", &engine.coordinator),
            ("launcher", &engine.launcher),
            ("command", &engine.command),
            ("restart_script", &engine.restart_script),
        ] {
            if value.trim().is_empty() {
                return Err(RunError::Config(format!("engine.{key} must not be empty")));
            }
        }
        Ok(())
    }
}
