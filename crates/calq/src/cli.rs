//! CLI argument parsing using clap derive macros.
//!
//! This module defines the command-line interface for calq.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// calq - Run CalDAV calendar-query filters against entity snapshots
#[derive(Parser, Debug)]
#[command(name = "calq")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbose output (show debug logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output JSON instead of plain text
    #[arg(long, global = true)]
    pub json: bool,

    /// Config file to use instead of the default location
    #[arg(long, global = true, env = "CALDAV_QUERY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compile a filter and show the pushed-down predicate and deferred filters
    Compile {
        /// Filter file (JSON element tree)
        filter: PathBuf,
    },

    /// Run a filter against a JSON entity snapshot
    #[command(alias = "q")]
    Query {
        /// Filter file (JSON element tree)
        #[arg(short, long)]
        filter: PathBuf,

        /// Entity snapshot file (JSON array of entities)
        #[arg(short, long)]
        snapshot: PathBuf,

        /// Restrict the search to a collection (repeatable)
        #[arg(short, long = "collection")]
        collections: Vec<String>,

        /// Also search collections nested below the given ones
        #[arg(short, long)]
        recursive: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Show the config file path
    Path,
}
