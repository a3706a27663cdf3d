//! Amber CLI - amber command

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;
mod config;
mod progress;

/// Amber - replicated append-only archives for experiment data
#[derive(Parser)]
#[command(name = "amber")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Replication peer (host or host:port); may be repeated
    #[arg(long = "peer", global = true, value_name = "ADDR")]
    peers: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the local identity that signs every record
    Init {
        /// Alias recorded on records this node writes
        #[arg(long)]
        alias: Option<String>,
    },
    /// Archive paths into a new experiment
    Create {
        /// Files or directory trees to archive
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// Open an existing experiment and show its state
    Open {
        /// Experiment id
        experiment: String,
    },
    /// Reconstruct an experiment's files under a directory
    Save {
        /// Experiment id
        experiment: String,
        /// Destination directory
        dest: PathBuf,
    },
    /// Drop local cache data for an experiment (reserved)
    Clean {
        /// Experiment id
        experiment: String,
    },
    /// Serve chain data to peers
    Serve {
        /// Listen address (default: 0.0.0.0 on the amber port)
        #[arg(long)]
        addr: Option<String>,
    },
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { alias } => cmd::init::run(alias),
        Commands::Create { paths } => cmd::create::run(&paths, &cli.peers),
        Commands::Open { experiment } => cmd::open::run(&experiment, &cli.peers),
        Commands::Save { experiment, dest } => cmd::save::run(&experiment, &dest, &cli.peers),
        Commands::Clean { experiment } => cmd::clean::run(&experiment, &cli.peers),
        Commands::Serve { addr } => cmd::serve::run(addr.as_deref(), &cli.peers),
    }
}
