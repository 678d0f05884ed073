//! Command-line interface for taxon-db.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **serve**: Start the HTTP API over an in-memory store
//! - **ranks**: Show the rank schema
//! - **check**: Validate a snapshot file against every taxonomy invariant
//! - **tree**: Print the taxonomy stored in a snapshot as a tree
//!
//! ## Usage
//!
//! ```text
//! # Start the server with a preloaded snapshot
//! taxon-db serve --snapshot taxonomy.json
//!
//! # Validate a snapshot before deploying it
//! taxon-db check taxonomy.json
//!
//! # Show the subtree under Carnivora, two levels deep
//! taxon-db tree taxonomy.json --root Carnivora --depth 2
//!
//! # JSON output for scripting
//! taxon-db ranks --format json
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod check;
pub mod ranks;
pub mod tree;

#[derive(Parser)]
#[command(name = "taxon-db")]
#[command(author = "Fulcrum Genomics")]
#[command(version)]
#[command(about = "In-memory taxonomic classification store with an HTTP API")]
#[command(
    long_about = "taxon-db keeps a taxonomy of named taxa in memory and serves it over HTTP.\n\nEvery change is validated before it is applied:\n- Names and synonyms are unique, ignoring case and whitespace\n- Ranks follow the configured schema from broad to narrow\n- The parent graph never contains a cycle"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(ServeArgs),

    /// Show the rank schema
    Ranks(ranks::RanksArgs),

    /// Validate a snapshot file
    Check(check::CheckArgs),

    /// Print a snapshot as a tree
    Tree(tree::TreeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8980", env = "TAXON_DB_PORT")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1", env = "TAXON_DB_ADDRESS")]
    pub address: String,

    /// Rank schema file (defaults to the built-in schema)
    #[arg(long, env = "TAXON_DB_RANKS")]
    pub ranks: Option<PathBuf>,

    /// Snapshot to preload; its rank schema is used for the store
    #[arg(long, env = "TAXON_DB_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Open the health endpoint in a browser
    #[arg(long)]
    pub open: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
