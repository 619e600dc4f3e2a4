//! Command line surface.
//!
//! Usage display exits with status 0 whether it was asked for (`--help`) or
//! caused by missing/invalid arguments. Existing job scripts rely on that.

pub mod dispatch;
pub mod types;

pub use dispatch::dispatch;
pub use types::Cli;

/// Exit status after printing usage, including for bad arguments.
pub const EXIT_USAGE: i32 = 0;

/// Print a clap parse error (or help/version) and return the exit status.
pub fn report_parse_error(err: &clap::Error) -> i32 {
    // clap sends help and version to stdout and real errors to stderr
    let _ = err.print();
    EXIT_USAGE
}
