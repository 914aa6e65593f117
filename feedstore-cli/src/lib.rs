//! Command-line interface for building feed stores.
#![forbid(unsafe_code)]

use std::io::Write;

use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use ortho_config::{OrthoConfig, SubcmdConfigMerge};
use serde::{Deserialize, Serialize};

mod build;
mod error;

pub use build::{BuildConfig, build_feed};
pub use error::CliError;

const ARG_FEED: &str = "feed";
const ARG_OUTPUT: &str = "output";
const ENV_FEED: &str = "FEEDSTORE_CMDS_BUILD_FEED";
const DEFAULT_OUTPUT: &str = "feedstore-output/feed.sqlite";

/// Run the CLI with the current process arguments and environment, printing
/// the run report to standard output.
pub fn run() -> Result<(), CliError> {
    let cli = Cli::try_parse().map_err(CliError::ArgumentParsing)?;
    let stdout = std::io::stdout();
    run_with(cli, &mut stdout.lock())
}

fn run_with(cli: Cli, out: &mut dyn Write) -> Result<(), CliError> {
    match cli.command {
        Command::Build(args) => {
            let config = args.into_config()?;
            let report = build_feed(&config)?;
            serde_json::to_writer_pretty(&mut *out, &report)
                .map_err(CliError::SerializeReport)?;
            writeln!(out).map_err(CliError::WriteReport)?;
        }
    }
    Ok(())
}

#[derive(Debug, Parser)]
#[command(
    name = "feedstore",
    about = "Import transit feeds into a queryable SQLite store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import a feed, repair known defects and optionally derive geometry.
    Build(BuildArgs),
}

/// CLI arguments for the `build` subcommand.
#[derive(Debug, Clone, Parser, Deserialize, Serialize, OrthoConfig, Default)]
#[command(
    long_about = "Build a feed store from a URL, ZIP archive or unpacked \
                 directory. Values can come from CLI flags, configuration \
                 files, or environment variables.",
    about = "Build a feed store"
)]
#[ortho_config(prefix = "FEEDSTORE")]
struct BuildArgs {
    /// Feed URL, archive path or directory.
    #[arg(value_name = "feed")]
    #[serde(default)]
    feed: Option<String>,
    /// Store file to write.
    #[arg(long = ARG_OUTPUT, value_name = "path")]
    #[serde(default)]
    output: Option<Utf8PathBuf>,
    /// Reopen an existing output store and skip checkpointed tables.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    resume: bool,
    /// Build the derived geometry tables.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    spatial: bool,
    /// Leave agency defects unrepaired.
    #[arg(long)]
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    skip_clean: bool,
}

impl BuildArgs {
    fn into_config(self) -> Result<BuildConfig, CliError> {
        let merged = self.load_and_merge().map_err(CliError::Configuration)?;
        BuildConfig::try_from(merged)
    }
}

impl TryFrom<BuildArgs> for BuildConfig {
    type Error = CliError;

    fn try_from(args: BuildArgs) -> Result<Self, Self::Error> {
        let feed = args
            .feed
            .filter(|feed| !feed.trim().is_empty())
            .ok_or(CliError::MissingArgument {
                field: ARG_FEED,
                env: ENV_FEED,
            })?;
        Ok(Self {
            feed,
            output: args
                .output
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_OUTPUT)),
            resume: args.resume,
            spatial: args.spatial,
            clean: !args.skip_clean,
        })
    }
}

#[cfg(test)]
mod tests;
