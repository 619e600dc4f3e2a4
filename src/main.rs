use clap::Parser;

use ckpt_run::cli::{dispatch, report_parse_error, Cli};

fn main() {
    let code = match Cli::try_parse() {
        Ok(cli) => dispatch(cli),
        Err(err) => report_parse_error(&err),
    };
    std::process::exit(code);
}
