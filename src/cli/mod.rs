//! Command-line interface for flashmap.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **search**: Find the buckets of an index that contain a query sequence
//! - **index**: Build, list or inspect bit-sliced indexes
//! - **filter-size**: Compute the Bloom filter size for an index
//! - **window-size**: Estimate a MashMap sketch window for refinement
//! - **serve**: Start the HTTP search API
//!
//! ## Usage
//!
//! ```text
//! # Build an index with 1 Mbp buckets
//! flashmap index build reference.fa.gz --output ref.fmi --bucket-size 1000000 --catalog indexes.json
//!
//! # Search a query, allowing 5% divergence
//! flashmap search query.fa --index ref --catalog indexes.json --substitution-rate 0.05
//!
//! # JSON output for scripting
//! flashmap search query.fa --index ref --catalog indexes.json --format json
//!
//! # Start the API
//! flashmap serve --catalog indexes.json --port 8080
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod index;
pub mod params;
pub mod search;

#[derive(Parser)]
#[command(name = "flashmap")]
#[command(version)]
#[command(about = "Approximate sequence search over bit-sliced minimizer indexes")]
#[command(
    long_about = "flashmap finds where a long query sequence (5-300 kbp) lies in a large reference.\n\nThe reference is split into buckets whose minimizers are stored in a bit-sliced\nBloom filter index. A search reports, per bucket:\n- The fraction of the query's minimizers present and an estimated percent identity\n- Or, in fragment mode, how many query fragments the bucket fully contains"
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
    /// Search a query sequence against an index
    Search(search::SearchArgs),

    /// Build and inspect indexes
    Index(index::IndexArgs),

    /// Compute the Bloom filter size that bounds false bucket hits
    FilterSize(params::FilterSizeArgs),

    /// Estimate a MashMap sketch window size
    WindowSize(params::WindowSizeArgs),

    /// Start the web server
    Serve(ServeArgs),
}

#[derive(clap::Args)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    pub port: u16,

    /// Address to bind to
    #[arg(short, long, default_value = "127.0.0.1")]
    pub address: String,

    /// Path to custom catalog file
    #[arg(long)]
    pub catalog: Option<PathBuf>,

    /// Open browser automatically
    #[arg(long)]
    pub open: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Load a catalog file, or the embedded catalog when no path is given
pub(crate) fn load_catalog(
    path: Option<&std::path::Path>,
) -> anyhow::Result<crate::index::store::IndexCatalog> {
    use crate::index::store::IndexCatalog;
    Ok(match path {
        Some(path) => IndexCatalog::load_from_file(path)?,
        None => IndexCatalog::load_embedded()?,
    })
}
