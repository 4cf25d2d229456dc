//! The `wxt` command line interface
#![allow(missing_docs)]

mod detect;
mod track;

use anyhow::Result;
use clap::Parser;
use std::process::ExitCode;

/// Top-level options of the `wxt` binary
#[derive(Parser)]
#[command(
    arg_required_else_help = true,
    author,
    about,
    disable_help_subcommand = true,
    name = "wxt",
    version
)]
pub struct Opts {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(action = clap::ArgAction::Count, global = true, long, short)]
    pub verbose: u8,
    /// Silence all log output
    #[arg(global = true, long, short)]
    pub quiet: bool,
    #[command(subcommand)]
    pub subcommand: SubcommandEnum,
}

#[derive(clap::Subcommand)]
pub enum SubcommandEnum {
    Detect(detect::Opts),
    #[command(name = "tracking", visible_alias = "track")]
    Track(track::Opts),
}

impl Opts {
    /// Dispatch to the selected subcommand
    pub fn run(&self) -> Result<ExitCode> {
        match &self.subcommand {
            SubcommandEnum::Detect(opts) => opts.run(),
            SubcommandEnum::Track(opts) => opts.run(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_command() {
        use clap::CommandFactory;
        Opts::command().debug_assert();
    }
}
