//! Command lines for the external checkpoint engine.
//!
//! The engine has four entry points: the coordinator daemon, a control tool
//! that talks to a running coordinator, the checkpointing launcher, and the
//! restart script it leaves in the checkpoint directory. Nothing here spawns
//! anything; callers decide how to run the returned `Command`.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::EngineConfig;
use crate::constants::child_env;
use crate::{Result, RunError};

/// Requests understood by the coordinator control tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Liveness/status query
    Status,
    /// Checkpoint all clients and block until the images are written
    Checkpoint,
    Quit,
}

impl ControlAction {
    pub fn flag(self) -> &'static str {
        match self {
            ControlAction::Status => "-s",
            ControlAction::Checkpoint => "--bcheckpoint",
            ControlAction::Quit => "--quit",
        }
    }
}

impl std::fmt::Display for ControlAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlAction::Status => write!(f, "status"),
            ControlAction::Checkpoint => write!(f, "checkpoint"),
            ControlAction::Quit => write!(f, "quit"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    pub fn restart_script_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.config.restart_script)
    }

    /// Daemonised coordinator that asks the OS for a port and writes it to
    /// `port_file`, exiting once its last client disconnects.
    pub fn coordinator_command(&self, directory: &Path, port_file: &Path) -> Result<Command> {
        let program = resolve(&self.config.coordinator).map_err(|err| {
            RunError::CoordinatorStart(format!("{}: {err}", self.config.coordinator))
        })?;

        let mut cmd = Command::new(program);
        cmd.arg("--ckptdir")
            .arg(directory)
            .arg("--daemon")
            .arg("--exit-on-last")
            .args(["-p", "0"])
            .arg("--port-file")
            .arg(port_file)
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        Ok(cmd)
    }

    pub fn control_command(&self, port: u16, action: ControlAction) -> Result<Command> {
        let program = resolve(&self.config.command).map_err(|err| {
            RunError::CoordinatorStart(format!("{}: {err}", self.config.command))
        })?;

        let mut cmd = Command::new(program);
        cmd.arg("-p")
            .arg(port.to_string())
            .arg(action.flag())
            .stdin(Stdio::null())
            .stdout(Stdio::null());
        Ok(cmd)
    }

    /// Start `program` fresh under the launcher. Compression is disabled and
    /// open files are captured so reopened files survive a restore.
    pub fn launch_command(
        &self,
        port: u16,
        directory: &Path,
        interval: Option<u64>,
        program: &OsString,
        args: &[OsString],
    ) -> Result<Command> {
        let launcher = resolve(&self.config.launcher).map_err(|err| RunError::ChildLaunch {
            program: self.config.launcher.clone(),
            source: io::Error::new(io::ErrorKind::NotFound, err.to_string()),
        })?;

        let mut cmd = Command::new(launcher);
        cmd.arg("-p")
            .arg(port.to_string())
            .arg("--ckptdir")
            .arg(directory)
            .arg("--no-gzip")
            .arg("--ckpt-open-files");
        if let Some(secs) = interval {
            cmd.arg("--interval").arg(secs.to_string());
        }
        cmd.arg(program).args(args);
        export_session_env(&mut cmd, port, directory);
        Ok(cmd)
    }

    /// Run the restart script the engine wrote at checkpoint time.
    pub fn restart_command(&self, port: u16, directory: &Path, args: &[OsString]) -> Result<Command> {
        let script = self.restart_script_path(directory);
        if !script.is_file() {
            return Err(RunError::ChildLaunch {
                program: script.display().to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "restart script not found"),
            });
        }

        let mut cmd = Command::new(script);
        cmd.arg("-p")
            .arg(port.to_string())
            .arg("-d")
            .arg(directory)
            .args(args);
        export_session_env(&mut cmd, port, directory);
        Ok(cmd)
    }
}

fn export_session_env(cmd: &mut Command, port: u16, directory: &Path) {
    cmd.env(child_env::COORDINATOR_PORT, port.to_string())
        .env(child_env::CHECKPOINT_DIR, directory);
}

fn resolve(name: &str) -> std::result::Result<PathBuf, which::Error> {
    which::which(name)
}
