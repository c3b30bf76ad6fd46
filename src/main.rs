mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use quill::config::QuillConfig;

#[derive(Parser)]
#[command(name = "quill", version, about = "Conversational journal assistant")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP server
    Serve,
    /// Send one message to the assistant
    Chat(cli::chat::ChatArgs),
    /// Manage journal entries directly
    Entries {
        #[command(subcommand)]
        action: cli::entries::EntriesAction,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = QuillConfig::load()?;

    // Log to stderr so stdout only carries replies and listings.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => {
            quill::server::serve(config).await?;
        }
        Command::Chat(args) => {
            cli::chat::chat(&config, args).await?;
        }
        Command::Entries { action } => {
            cli::entries::run(&config, action)?;
        }
    }

    Ok(())
}
