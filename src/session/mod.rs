//! Per-invocation session: mode, checkpoint directory, coordinator port and
//! the tracked child.

pub mod directory;

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use directory::{
    create_launch_directory, launch_directory_name, port_file_path, resolve_restart_directory,
};

/// What the session runs once the coordinator is up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Start `program` fresh under the checkpointing launcher.
    Launch {
        program: OsString,
        args: Vec<OsString>,
    },
    /// Resume from the restart artifact in `directory`.
    Restart {
        directory: PathBuf,
        args: Vec<OsString>,
    },
}

impl Mode {
    pub fn is_restart(&self) -> bool {
        matches!(self, Mode::Restart { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Mode::Launch { .. } => "launch",
            Mode::Restart { .. } => "restart",
        }
    }
}

/// Immutable after construction except for the child PID, which is set
/// exactly once when the child is spawned.
#[derive(Debug)]
pub struct Session {
    mode: Mode,
    directory: PathBuf,
    port: u16,
    coordinator_pid: Option<u32>,
    child_pid: OnceLock<u32>,
}

impl Session {
    pub fn new(mode: Mode, directory: PathBuf, port: u16, coordinator_pid: Option<u32>) -> Self {
        Self {
            mode,
            directory,
            port,
            coordinator_pid,
            child_pid: OnceLock::new(),
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn coordinator_pid(&self) -> Option<u32> {
        self.coordinator_pid
    }

    pub fn child_pid(&self) -> Option<u32> {
        self.child_pid.get().copied()
    }

    /// Record the spawned child. Returns false if a child was already recorded.
    pub fn set_child_pid(&self, pid: u32) -> bool {
        self.child_pid.set(pid).is_ok()
    }
}
