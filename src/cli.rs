//! CLI argument parsing and command definitions.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Request filter pipeline
#[derive(Parser)]
#[command(
    name = "portcullis",
    version,
    about = "Request filter pipeline with global, method, path and route scoping",
    long_about = "Loads a TOML filter configuration, shows which filters apply to a request, \
                  and runs JSON-described requests through the before/after filter pipeline."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Run a JSON request from stdin through the pipeline (alias: run)
    #[command(alias = "run")]
    Handle,
    /// Print the filters that apply to a request
    Resolve {
        /// HTTP method
        #[arg(long, short = 'm', default_value = "GET")]
        method: String,
        /// Request path
        #[arg(long, short = 'p')]
        path: String,
    },
    /// Generate default configuration file
    Init {
        /// Path where to create the configuration file
        #[arg(long, short = 'p')]
        path: Option<PathBuf>,
    },
    /// Validate configuration file
    Check,
    /// Display version information
    Version,
}
