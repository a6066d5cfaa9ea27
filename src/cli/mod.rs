//! CLI module - Command-line interface for Cinefind
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// Cinefind - debounced movie search with trending searches
#[derive(Parser)]
#[command(name = "cinefind")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the search API server (default)
    #[command(alias = "daemon")]
    Serve,

    /// Search the catalog once and record the query
    #[command(alias = "s")]
    Search {
        /// Search query; omit to list the default selection
        query: Vec<String>,
    },

    /// Show the most searched queries
    #[command(alias = "t")]
    Trending {
        /// Number of entries to show
        #[arg(short, long)]
        limit: Option<u64>,
    },

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
