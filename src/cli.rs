use std::{net::SocketAddr, path::PathBuf};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Semantic product search", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Build the index and serve the HTTP search API (default)
    Serve {
        /// Address to listen on. Overrides SEARCH_BIND.
        #[clap(short, long)]
        bind: Option<SocketAddr>,

        /// Read products from a JSON file instead of MySQL
        #[clap(long)]
        catalog: Option<PathBuf>,
    },

    /// Build the index, run one query and print the results as JSON
    Search {
        /// Query text
        query: String,

        /// Maximum number of results
        #[clap(short = 'k', long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
        top_k: u64,

        /// Read products from a JSON file instead of MySQL
        #[clap(long)]
        catalog: Option<PathBuf>,
    },
}
