// (c) Roel Kluin, 2023, GPL v3

// target/release/kmix index -k 31 -i counts.tsv.gz -o idx
// target/release/kmix merge -i idx --min-overlap 15 --max-overlap 30 -s select.tsv --with-counts -o contigs.tsv

use anyhow::Result;
use clap::{Parser, Subcommand};
use kmix::{index, merge, query};
use tracing_subscriber::EnvFilter;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Index a count table for random access by feature
    Index(index::IndexCmd),

    /// Merge indexed k-mers into contigs along their overlaps
    Merge(merge::MergeCmd),

    /// Print the counts of given features
    Query(query::QueryCmd),
}

/// Index k-mer count tables and merge k-mers into contigs
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Kmix {
    /// Turn debugging information on, twice for tracing
    #[arg(short, long, action = clap::ArgAction::Count)]
    debug: u8,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let kmix = Kmix::parse();

    let level = match kmix.debug {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(std::io::stderr)
        .init();

    match kmix.command {
        Commands::Index(index_cmd) => index::index(index_cmd),
        Commands::Merge(merge_cmd) => merge::merge(merge_cmd),
        Commands::Query(query_cmd) => query::query(query_cmd),
    }
}
