use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Token usage tracker for OpenClaw and Codex session logs",
    long_about = None
)]
pub struct Cli {
    /// Config file to use instead of the default location
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// SQLite database path, overriding the config file
    #[arg(long, value_name = "FILE")]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one ingestion pass and print its stats
    Ingest,
    /// Ingest, then print the dashboard views
    Dashboard,
    /// Print stored sessions, newest first
    Sessions {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}
