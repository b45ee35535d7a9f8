use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Kestrel - BFT verifier node
#[derive(Parser)]
#[command(name = "kestrel")]
#[command(about = "Kestrel verifier node and utilities")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a Kestrel node
    Run {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.json")]
        config: PathBuf,
    },

    /// Initialize a new single-verifier configuration
    Init {
        /// Output path for configuration file
        #[arg(short, long, default_value = "config.json")]
        output: PathBuf,
    },

    /// Generate a new verifier key
    Keygen {
        /// Output file for secret key
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show node status
    Status {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        endpoint: String,
    },

    /// Stage a membership vote on a node
    Propose {
        /// RPC endpoint
        #[arg(short, long, default_value = "http://127.0.0.1:8080")]
        endpoint: String,

        /// Address to vote on
        #[arg(long)]
        address: String,

        /// Vote to remove the address instead of adding it
        #[arg(long, default_value = "false")]
        drop: bool,
    },
}
