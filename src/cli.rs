use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::pr::PrOptions;

#[derive(Parser, Debug)]
#[command(name = "pt", version)]
#[command(about = "Turn local commits into GitHub pull requests")]
struct CliArgs {
    /// Log subprocess and API detail
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Push selected commits to their own branch and open a PR for them
    Pr {
        /// Create the PR as a draft
        #[arg(long)]
        draft: bool,

        /// Enable squash auto-merge on the new PR
        #[arg(long = "auto-merge")]
        auto_merge: bool,
    },

    /// Pick commits after the upstream branch and print their hashes
    #[command(name = "select-commit")]
    SelectCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Pr(PrOptions),
    SelectCommit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub debug: bool,
}

/// Parses command-line arguments into the command to run.
///
/// Help and version requests come back as `clap::Error` values for the
/// caller to print.
pub fn parse_args<I, T>(args: I) -> Result<Invocation>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;

    let command = match cli.command {
        CliCommand::Pr { draft, auto_merge } => Command::Pr(PrOptions { draft, auto_merge }),
        CliCommand::SelectCommit => Command::SelectCommit,
    };

    Ok(Invocation {
        command,
        debug: cli.debug,
    })
}
