// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for `envlane`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "envlane",
    version,
    about = "Run commands against environment/layer checkouts, one at a time per checkout.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML). Defaults apply if it does not exist.
    #[arg(long, value_name = "PATH", default_value = "Envlane.toml", global = true)]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ENVLANE_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL", global = true)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Clone, Subcommand)]
pub enum CliCommand {
    /// Admit one command, run it and stream its output.
    Submit(SubmitArgs),
    /// Print the last issued task ID.
    Sequence,
    /// Parse + validate the config and print the effective settings.
    Check,
}

#[derive(Debug, Clone, clap::Args)]
pub struct SubmitArgs {
    /// Environment name (first half of the sync key).
    #[arg(long)]
    pub env: String,

    /// Layer name (second half of the sync key).
    #[arg(long)]
    pub layer: String,

    /// Working directory of the process.
    #[arg(long, value_name = "DIR")]
    pub workdir: Option<PathBuf>,

    /// Explicit dedup hash.
    #[arg(long, conflicts_with = "dedup")]
    pub hash: Option<String>,

    /// Derive the dedup hash from the command content.
    #[arg(long)]
    pub dedup: bool,

    /// Kill the process after this many seconds.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Extra environment variable, `KEY=VALUE`. Repeatable.
    #[arg(long = "set-env", value_name = "KEY=VALUE")]
    pub set_env: Vec<String>,

    /// Program and arguments.
    #[arg(trailing_var_arg = true, required = true, value_name = "CMD")]
    pub command: Vec<String>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
