use std::path::PathBuf;

use anyhow::Result;
use chatbot_rag::commands::{self, ServeOptions};
use chatbot_rag::config::{run_interactive_config, show_config};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "chatbot-rag")]
#[command(about = "A retrieval-augmented chatbot over a directory of institutional documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml, the document directory and the vector store
    #[arg(long, global = true, default_value = ".")]
    base_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the embedding server, language model and chunking
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Start the HTTP server
    Serve {
        /// Address to bind instead of the configured one
        #[arg(long)]
        host: Option<String>,
        /// Port to bind instead of the configured one
        #[arg(long)]
        port: Option<u16>,
    },
    /// Rebuild the vector store from the document directory
    Retrain,
    /// Answer a single question
    Ask {
        /// The question to answer
        question: String,
    },
    /// Show embedding server, language model and vector store status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_dir = cli.base_dir;

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(&base_dir)?;
            } else {
                run_interactive_config(&base_dir)?;
            }
        }
        Commands::Serve { host, port } => {
            commands::serve(&base_dir, ServeOptions { host, port }).await?;
        }
        Commands::Retrain => {
            commands::retrain(&base_dir).await?;
        }
        Commands::Ask { question } => {
            commands::ask(&base_dir, &question).await?;
        }
        Commands::Status => {
            commands::show_status(&base_dir).await?;
        }
    }

    Ok(())
}
