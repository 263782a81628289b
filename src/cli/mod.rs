//! Command line interface.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};

use crate::models::OutputFormat;

/// Semantic search over a local document vault.
#[derive(Debug, Parser)]
#[command(name = "vsearch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Check infrastructure status (embedding service, vector store)
    Status,

    /// Index the vault into the vector store
    Index(commands::IndexArgs),

    /// Search indexed documents
    Search(commands::SearchArgs),

    /// Watch the index vector count over time
    Watch(commands::WatchArgs),

    /// Fetch stored vectors by id
    Fetch(commands::FetchArgs),

    /// Delete and recreate the index
    Reset(commands::ResetArgs),

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

// FromStr for OutputFormat is implemented in models::search
