use clap::CommandFactory;
use tracing::debug;

use super::types::Cli;
use super::EXIT_USAGE;
use crate::config::Config;
use crate::logging::init_tracing;
use crate::session::Mode;
use crate::{orchestrator, Result, RunError};

/// Run the parsed command line and return the process exit status.
pub fn dispatch(cli: Cli) -> i32 {
    init_tracing(cli.log_format, cli.verbosity());

    let Some(mode) = cli.mode() else {
        print_usage();
        return EXIT_USAGE;
    };

    let result = load_config(&cli, &mode).and_then(|config| orchestrator::run(mode, &config));
    match result {
        Ok(code) => code,
        Err(err) => report(&err),
    }
}

fn load_config(cli: &Cli, mode: &Mode) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    if !mode.is_restart() {
        config.apply_overrides(cli.overrides())?;
    }
    debug!(?config, "configuration loaded");
    Ok(config)
}

fn print_usage() {
    eprintln!("{}", Cli::command().render_usage());
    eprintln!("Try 'ckpt-run --help' for more information.");
}

fn report(err: &RunError) -> i32 {
    debug!(error = ?err, "session failed");
    eprintln!("ckpt-run: {err}");
    err.exit_code()
}
