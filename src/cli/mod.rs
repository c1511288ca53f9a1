//! CLI module - Command-line interface for franchise-sync
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// franchise-sync - Anime franchise consolidation
/// Resolves one franchise across AniList, MyAnimeList and TVDB into SQL upserts
#[derive(Parser)]
#[command(name = "franchise-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Crawl a franchise and cache its raw sources
    #[command(alias = "f")]
    Fetch {
        /// Franchise title
        #[arg(required = true)]
        title: Vec<String>,
        /// AniList ID of the root entry, skips title disambiguation
        #[arg(long)]
        root_id: Option<i32>,
    },

    /// Resolve cached sources and print a summary
    #[command(alias = "p")]
    Process {
        /// Franchise slug
        slug: String,
    },

    /// Write SQL for a cached franchise
    #[command(alias = "g")]
    Generate {
        /// Franchise slug
        slug: String,
    },

    /// Fetch, process and generate in one go
    Run {
        /// Franchise title
        #[arg(required = true)]
        title: Vec<String>,
        /// AniList ID of the root entry, skips title disambiguation
        #[arg(long)]
        root_id: Option<i32>,
    },

    /// Search AniList without fetching anything
    #[command(alias = "s")]
    Search {
        /// Search query
        #[arg(required = true)]
        query: Vec<String>,
    },

    /// List cached franchises
    #[command(alias = "ls")]
    List,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
