//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::classify::{FixedClassifier, FixedOutcome};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind_addr`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

/// Play command arguments.
#[derive(Debug, Args)]
pub struct PlayCommand {
    /// Photo of the current item
    #[arg(value_name = "IMAGE")]
    pub image: PathBuf,

    /// Call the vision model directly instead of the local endpoint
    #[arg(short, long, conflicts_with = "assume")]
    pub direct: bool,

    /// Skip the classifier and assume this answer
    #[arg(short, long, value_enum)]
    pub assume: Option<AssumeArg>,

    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Summary command arguments.
#[derive(Debug, Args)]
pub struct SummaryCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Restart command arguments.
#[derive(Debug, Args)]
pub struct RestartCommand {
    /// Skip confirmation
    #[arg(short, long)]
    pub yes: bool,
}

/// Items command arguments.
#[derive(Debug, Args)]
pub struct ItemsCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// A fixed classifier answer for offline play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AssumeArg {
    /// Every photo matches
    Yes,
    /// No photo matches
    No,
    /// The classifier is unreachable (photos match in offline mode)
    Offline,
}

impl From<AssumeArg> for FixedClassifier {
    fn from(arg: AssumeArg) -> Self {
        match arg {
            AssumeArg::Yes => Self::yes(),
            AssumeArg::No => Self::no(),
            AssumeArg::Offline => Self::new(FixedOutcome::Unreachable),
        }
    }
}
