/// Exit status when a trapped signal produced a durable checkpoint.
pub const EXIT_CHECKPOINT_SAVED: i32 = 42;

/// Exit status when a trapped signal arrived but the checkpoint failed.
pub const EXIT_CHECKPOINT_FAILED: i32 = 24;

/// Exit status when the coordinator never came up.
/// The OS truncates this to 164 for the waiting parent.
pub const EXIT_COORDINATOR_FAILED: i32 = 420;

/// Exit status for session setup failures (directory, configuration).
pub const EXIT_SETUP_FAILED: i32 = 1;

/// Exit status when the child executable cannot be found.
pub const EXIT_COMMAND_NOT_FOUND: i32 = 127;

/// Exit status when the child executable exists but cannot be run.
pub const EXIT_COMMAND_NOT_EXECUTABLE: i32 = 126;

/// Children killed by signal `n` map to `SIGNAL_EXIT_BASE + n`.
pub const SIGNAL_EXIT_BASE: i32 = 128;

/// File inside the checkpoint directory where the coordinator publishes its port.
pub const PORT_FILE_NAME: &str = "port";

/// Default prefix for launch-mode checkpoint directories.
pub const DEFAULT_DIR_PREFIX: &str = "ckpt";

/// Environment variable naming a configuration file.
pub const CONFIG_ENV_VAR: &str = "CKPT_RUN_CONFIG";

/// Environment variables exported to the supervised child.
pub mod child_env {
    pub const COORDINATOR_PORT: &str = "DMTCP_COORD_PORT";
    pub const CHECKPOINT_DIR: &str = "DMTCP_CHECKPOINT_DIR";
}
