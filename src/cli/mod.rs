//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use commands::{BricksCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Run brick pipelines from mod definitions
#[derive(Debug, Parser, Clone)]
#[command(name = "brick")]
#[command(version)]
#[command(about = "Run brick pipelines from mod definitions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    /// Path to the runtime configuration file
    #[arg(long, global = true)]
    pub runtime_config: Option<PathBuf>,
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a component of a mod definition
    Run(RunCommand),

    /// Validate a mod definition
    Validate(ValidateCommand),

    /// List registered bricks
    Bricks(BricksCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }
}
