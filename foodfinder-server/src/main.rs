#![cfg_attr(not(test), forbid(unsafe_code))]
#![warn(clippy::pedantic)]

//! Main entry point for the Food Finder server binary.

use anyhow::Context;
use clap::{Parser, Subcommand};
use server::commands::spec::generate_spec;
use shared::config::server::Config;
use std::path::PathBuf;

/// Main CLI structure for the Food Finder server
#[derive(Parser, Debug)]
#[command(name = "foodfinder-server")]
#[command(about = "Chat gateway between the Food Finder widget and Google Gemini", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to bind; overrides the configuration file and environment
        #[arg(long, short)]
        port: Option<u16>,

        /// Path to a YAML or JSON configuration file
        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Print or write the OpenAPI document
    Spec {
        /// `json`, `yaml`, or an output path (`.json` writes JSON, anything else YAML)
        output: Option<String>,
    },
}

/// Loads `.env.local` and `.env`, then parses the command line.
#[must_use]
pub fn initialize_cli() -> Cli {
    dotenv::from_filename(".env.local").ok();
    dotenv::dotenv().ok();
    Cli::parse()
}

/// Resolves the configuration and runs the server until shutdown.
///
/// # Errors
/// Returns an error if configuration loading or server startup fails.
pub async fn handle_serve_command(port: Option<u16>, config: Option<PathBuf>) -> anyhow::Result<()> {
    let resolved_config =
        Config::load_config(config, port).context("failed to load configuration")?;
    server::server::run(resolved_config).await
}

/// Dispatches the parsed command.
///
/// # Errors
/// Returns an error if the selected command fails.
pub async fn run_app(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Serve { port, config } => handle_serve_command(port, config).await,
        Commands::Spec { output } => generate_spec(output.as_deref()),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    run_app(initialize_cli()).await
}
