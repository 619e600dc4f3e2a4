use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

use crate::config::LaunchOverrides;
use crate::logging::{LogFormat, Verbosity};
use crate::session::Mode;

#[derive(Debug, Parser)]
#[command(name = "ckpt-run")]
#[command(
    about = "Run a program under a checkpoint coordinator, checkpoint it on signal, restart it later",
    long_about = None
)]
#[command(version)]
#[command(override_usage = "ckpt-run [OPTIONS] <PROGRAM> [ARGS]...\n       \
                            ckpt-run -r <CHECKPOINT_DIR> [OPTIONS] [RESTART_ARGS]...")]
#[command(after_help = "\
Sending USR1, HUP, INT, QUIT or TERM checkpoints the program and exits.

Exit status:
  42   checkpoint saved after a signal
  24   checkpoint failed after a signal
  420  coordinator failed to start (seen as 164 by the parent)
  n    the program's own exit status")]
pub struct Cli {
    /// Restart from the checkpoint in this directory
    #[arg(short = 'r', long = "restart", value_name = "CHECKPOINT_DIR")]
    pub restart: Option<PathBuf>,

    /// Configuration file (defaults to $CKPT_RUN_CONFIG)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Prefix for the new checkpoint directory
    #[arg(long, conflicts_with = "restart")]
    pub prefix: Option<String>,

    /// Where to create the new checkpoint directory
    #[arg(long, value_name = "DIR", conflicts_with = "restart")]
    pub base_dir: Option<PathBuf>,

    /// Also checkpoint every SECS seconds
    #[arg(long, value_name = "SECS", conflicts_with = "restart")]
    pub interval: Option<u64>,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Program and its arguments, or arguments for the restart script with -r
    #[arg(
        value_name = "PROGRAM",
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<OsString>,
}

impl Cli {
    /// Session mode, or None if there is nothing to run.
    pub fn mode(&self) -> Option<Mode> {
        match (&self.restart, self.command.split_first()) {
            (Some(directory), _) => Some(Mode::Restart {
                directory: directory.clone(),
                args: self.command.clone(),
            }),
            (None, Some((program, args))) => Some(Mode::Launch {
                program: program.clone(),
                args: args.to_vec(),
            }),
            (None, None) => None,
        }
    }

    pub fn overrides(&self) -> LaunchOverrides {
        LaunchOverrides {
            prefix: self.prefix.clone(),
            base_dir: self.base_dir.clone(),
            interval: self.interval,
        }
    }

    pub fn verbosity(&self) -> Verbosity {
        Verbosity::from_flags(self.verbose, self.quiet)
    }
}
