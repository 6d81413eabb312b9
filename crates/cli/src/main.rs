//! MedRAG CLI
//!
//! Main entry point for the medrag command-line tool: index ingestion,
//! status, one-off questions and the chat server.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IngestCommand, ServeCommand, StatusCommand};
use medrag_core::{config::AppConfig, logging};
use std::path::PathBuf;

/// MedRAG - answers medical questions from oncology and neurology documents
#[derive(Parser, Debug)]
#[command(name = "medrag")]
#[command(about = "Medical question answering over indexed document collections", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "MEDRAG_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "MEDRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    /// Generation provider (openai, ollama)
    #[arg(short, long, global = true, env = "MEDRAG_PROVIDER")]
    provider: Option<String>,

    /// Generation model identifier
    #[arg(short, long, global = true, env = "MEDRAG_MODEL")]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build any missing collection index
    Ingest(IngestCommand),

    /// Show index status per collection
    Status(StatusCommand),

    /// Ask a question across all collections
    Ask(AskCommand),

    /// Run the chat HTTP server
    Serve(ServeCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Workspace and config file flags must be visible to the loader
    if let Some(ref workspace) = cli.workspace {
        std::env::set_var("MEDRAG_WORKSPACE", workspace);
    }
    if let Some(ref config_file) = cli.config {
        std::env::set_var("MEDRAG_CONFIG", config_file);
    }

    let config = AppConfig::load()?.with_overrides(
        cli.workspace,
        cli.config,
        cli.provider,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("MedRAG CLI starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("Provider: {} (model: {})", config.llm.provider, config.llm.model);
    tracing::debug!(
        "Embedding: {} (model: {})",
        config.embedding.provider,
        config.embedding.model
    );

    let command_name = match &cli.command {
        Commands::Ingest(_) => "ingest",
        Commands::Status(_) => "status",
        Commands::Ask(_) => "ask",
        Commands::Serve(_) => "serve",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ingest(cmd) => cmd.execute(&config).await.map_err(anyhow::Error::from),
        Commands::Status(cmd) => cmd.execute(&config).await.map_err(anyhow::Error::from),
        Commands::Ask(cmd) => cmd.execute(&config).await.map_err(anyhow::Error::from),
        Commands::Serve(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {:#}", e),
    }

    result
}
