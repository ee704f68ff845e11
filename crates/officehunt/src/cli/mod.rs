//! Command-line interface for officehunt.
//!
//! This module provides the CLI structure for the `hunt` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AssumeArg, ConfigCommand, ItemsCommand, PlayCommand, RestartCommand, ServeCommand,
    StatusCommand, SummaryCommand,
};

/// hunt - An office scavenger hunt
///
/// Photograph each target object in turn; a vision model checks the photo
/// and your progress is saved after every find.
#[derive(Debug, Parser)]
#[command(name = "hunt")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the local classification endpoint
    Serve(ServeCommand),

    /// Submit a photo for the current item
    Play(PlayCommand),

    /// Show the current item and progress
    Status(StatusCommand),

    /// Show the hunt summary
    Summary(SummaryCommand),

    /// Clear all progress and start over
    Restart(RestartCommand),

    /// List the items to find
    Items(ItemsCommand),

    /// View or validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
