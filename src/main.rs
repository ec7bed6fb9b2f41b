//! portcullis: request filter pipeline CLI
//!
//! Loads a filter configuration, reports which filters apply to a request,
//! and runs JSON requests through the before/after pipeline.

mod cli;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands};
use portcullis::config::{self, ConfigService};
use portcullis::domain;
use portcullis::service::{FilterPipeline, RequestService};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Init writes the file before anything tries to load it
    if let Commands::Init { path } = &cli.command {
        let config_path = if let Some(p) = path {
            ConfigService::generate_at(p)?;
            p.clone()
        } else {
            ConfigService::generate_default()?;
            ConfigService::default_path()
        };
        if !cli.quiet {
            eprintln!("Configuration file created at: {}", config_path.display());
        }
        return Ok(());
    }

    // Load configuration
    let config = ConfigService::load(cli.config.as_deref())?;

    // Initialize logging if debug mode
    if cli.debug || config.debug {
        domain::logger::init(&config)?;
    }

    // Execute command
    match cli.command {
        Commands::Handle => {
            let service = RequestService::new(&config)?;
            service.run()?;
        }
        Commands::Resolve { method, path } => {
            let service = RequestService::new(&config)?;
            service.print_resolved(&method, &path)?;
        }
        Commands::Check => {
            config::validate(&config)?;
            // Alias and placement errors only surface once the pipeline is built
            FilterPipeline::new(&config)?;
            if !cli.quiet {
                eprintln!("Configuration is valid.");
            }
        }
        Commands::Version => {
            println!("portcullis {}", env!("CARGO_PKG_VERSION"));
        }
        Commands::Init { .. } => {}
    }

    Ok(())
}
