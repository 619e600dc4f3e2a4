//! Coordinator supervision: start the daemon, learn its port, and send it
//! control requests.

pub mod port;

use std::fs;
use std::io;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::config::SessionConfig;
use crate::engine::{ControlAction, Engine};
use crate::session::port_file_path;
use crate::{Result, RunError};

pub use port::{read_port, wait_for_port};

/// Handle to a running coordinator, addressed by its port.
#[derive(Debug, Clone)]
pub struct Coordinator {
    engine: Engine,
    port: u16,
    starter_pid: Option<u32>,
}

impl Coordinator {
    /// Start a coordinator for `directory` and wait until it publishes a port.
    ///
    /// Fails with `CoordinatorStart` if the coordinator cannot be executed,
    /// exits early, or never writes the port descriptor.
    pub fn start(engine: &Engine, directory: &Path, settings: &SessionConfig) -> Result<Self> {
        let port_file = port_file_path(directory);
        let mut cmd = engine.coordinator_command(directory, &port_file)?;

        // A restart directory still holds the previous session's port.
        match fs::remove_file(&port_file) {
            Ok(()) => debug!(path = %port_file.display(), "removed stale port file"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(RunError::CoordinatorStart(format!(
                    "cannot remove stale port file {}: {err}",
                    port_file.display()
                )))
            }
        }

        let mut starter = cmd
            .spawn()
            .map_err(|err| RunError::CoordinatorStart(format!("cannot execute coordinator: {err}")))?;
        let starter_pid = starter.id();
        debug!(pid = starter_pid, dir = %directory.display(), "coordinator spawned");

        let port = wait_for_port(
            &port_file,
            &mut starter,
            settings.port_timeout(),
            settings.poll_interval(),
        )?;
        info!(port, dir = %directory.display(), "coordinator published port");

        Ok(Self {
            engine: engine.clone(),
            port,
            starter_pid: Some(starter_pid),
        })
    }

    /// Address an already running coordinator.
    pub fn attach(engine: &Engine, port: u16) -> Self {
        Self {
            engine: engine.clone(),
            port,
            starter_pid: None,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn starter_pid(&self) -> Option<u32> {
        self.starter_pid
    }

    /// Liveness query. Any failure is fatal for the session.
    pub fn check_status(&self, timeout: Duration) -> Result<()> {
        let mut cmd = self.engine.control_command(self.port, ControlAction::Status)?;
        let mut child = cmd
            .spawn()
            .map_err(|err| RunError::CoordinatorStart(format!("cannot query coordinator: {err}")))?;

        match child.wait_timeout(timeout) {
            Ok(Some(status)) if status.success() => {
                debug!(port = self.port, "coordinator is alive");
                Ok(())
            }
            Ok(Some(status)) => Err(RunError::CoordinatorStart(format!(
                "status query on port {} returned {status}",
                self.port
            ))),
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                Err(RunError::CoordinatorStart(format!(
                    "status query on port {} did not answer within {}s",
                    self.port,
                    timeout.as_secs_f32()
                )))
            }
            Err(err) => Err(RunError::CoordinatorStart(format!(
                "cannot wait for status query: {err}"
            ))),
        }
    }

    /// Checkpoint every client and block until the images are durable.
    ///
    /// No timeout is applied.
    pub fn checkpoint(&self) -> Result<()> {
        let status = self
            .run(ControlAction::Checkpoint)
            .map_err(|err| RunError::CheckpointFailure(err.to_string()))?;
        if status.success() {
            Ok(())
        } else {
            Err(RunError::CheckpointFailure(format!(
                "checkpoint command returned {status}"
            )))
        }
    }

    /// Ask the coordinator to shut down. Best effort: the coordinator may
    /// already be gone after its last client disconnected.
    pub fn quit(&self) -> bool {
        match self.run(ControlAction::Quit) {
            Ok(status) if status.success() => true,
            Ok(status) => {
                debug!(port = self.port, %status, "coordinator quit not acknowledged");
                false
            }
            Err(err) => {
                debug!(port = self.port, error = %err, "coordinator quit failed");
                false
            }
        }
    }

    fn run(&self, action: ControlAction) -> Result<ExitStatus> {
        let mut cmd = self.engine.control_command(self.port, action)?;
        if action == ControlAction::Quit {
            cmd.stderr(Stdio::null());
        }
        debug!(port = self.port, %action, "sending coordinator request");
        cmd.status().map_err(|err| {
            warn!(port = self.port, %action, error = %err, "coordinator request failed to run");
            RunError::CoordinatorStart(format!("cannot send {action} request: {err}"))
        })
    }
}
