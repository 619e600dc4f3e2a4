//! Error taxonomy for a checkpointed session and its exit-code mapping.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::constants::{
    EXIT_CHECKPOINT_FAILED, EXIT_COMMAND_NOT_EXECUTABLE, EXIT_COMMAND_NOT_FOUND,
    EXIT_COORDINATOR_FAILED, EXIT_SETUP_FAILED,
};

/// Shared result type.
pub type Result<T> = std::result::Result<T, RunError>;

#[derive(Debug, Error)]
pub enum RunError {
    /// Launch-mode checkpoint directory could not be created.
    #[error("cannot create checkpoint directory {}: {source}", .path.display())]
    DirectoryCreate {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Restart-mode checkpoint directory does not exist.
    #[error("checkpoint directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Coordinator could not be started, never published a port, or rejected
    /// the status query.
    #[error("coordinator failed to start: {0}")]
    CoordinatorStart(String),

    /// The blocking checkpoint command reported failure.
    #[error("checkpoint failed: {0}")]
    CheckpointFailure(String),

    /// The program or restart script could not be executed.
    #[error("cannot execute {program}: {source}")]
    ChildLaunch {
        program: String,
        #[source]
        source: io::Error,
    },

    /// Signal handlers could not be installed.
    #[error("cannot install signal handlers: {0}")]
    SignalInstall(#[source] io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl RunError {
    /// Process exit status that reports this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::DirectoryCreate { .. }
            | RunError::DirectoryNotFound(_)
            | RunError::SignalInstall(_)
            | RunError::Config(_) => EXIT_SETUP_FAILED,
            RunError::CoordinatorStart(_) => EXIT_COORDINATOR_FAILED,
            RunError::CheckpointFailure(_) => EXIT_CHECKPOINT_FAILED,
            RunError::ChildLaunch { source, .. } => match source.kind() {
                io::ErrorKind::NotFound => EXIT_COMMAND_NOT_FOUND,
                _ => EXIT_COMMAND_NOT_EXECUTABLE,
            },
        }
    }
}

impl From<toml::de::Error> for RunError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}
