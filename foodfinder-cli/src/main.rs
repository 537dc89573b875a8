//! Command-line client for the Smart Food Finder assistant.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

mod commands;

use commands::{
    chat::{AskArgs, ChatArgs},
    config::ConfigFormat,
};

/// Food Finder CLI
#[derive(Parser, Debug)]
#[command(name = "foodfinder")]
#[command(about = "Chat with the Smart Food Finder assistant from your terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start an interactive chat session
    Chat(ChatArgs),

    /// Ask a single question
    Ask(AskArgs),

    /// Generate a default server configuration file
    Config {
        /// Format of the configuration file
        #[arg(long, short, value_enum, default_value_t = ConfigFormat::Yaml)]
        format: ConfigFormat,

        /// Directory to write the file into
        #[arg(long, short, default_value = ".")]
        output: PathBuf,
    },

    /// Generate shell completion scripts for the CLI
    Completion {
        /// The shell type (bash, zsh, fish, powershell, elvish)
        #[arg(long, short, value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    match cli.command {
        Commands::Chat(args) => commands::chat::handle_chat(args).await?,
        Commands::Ask(args) => commands::chat::handle_ask(args).await?,
        Commands::Config { format, output } => {
            commands::config::generate_config(format, &output)?;
        }
        Commands::Completion { shell } => {
            commands::completion::generate_completion(shell, &mut std::io::stdout());
        }
    }

    Ok(())
}
