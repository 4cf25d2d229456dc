#![allow(missing_docs)]

use clap::Parser;
use std::process::{ExitCode, Termination};
use wxtools_cli::Opts;

fn main() -> ExitCode {
    let opts = Opts::parse();

    stderrlog::new()
        .verbosity(usize::from(opts.verbose) + 1)
        .quiet(opts.quiet)
        .init()
        .expect("Failed to initialise logging");

    match opts.run() {
        Ok(code) => code,
        result @ Err(_) => result.report(),
    }
}
