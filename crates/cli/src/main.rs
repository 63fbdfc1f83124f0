//! pdfchat CLI
//!
//! Main entry point for the pdfchat command-line tool.
//! Indexes a directory of PDFs and answers questions about them, from the
//! terminal or over HTTP.

mod commands;
mod server;

use clap::{Parser, Subcommand};
use commands::{AskCommand, IndexCommand, ServeCommand, StatsCommand};
use pdfchat_core::{config::AppConfig, logging, AppError, AppResult, CliOverrides, LogFormat};
use std::path::PathBuf;

/// pdfchat - chat with your PDFs, with citations
#[derive(Parser, Debug)]
#[command(name = "pdfchat")]
#[command(about = "Question answering over PDF documents with citations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to workspace directory (default: current directory)
    #[arg(short, long, global = true, env = "PDFCHAT_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Path to config file
    #[arg(short, long, global = true, env = "PDFCHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of source PDFs
    #[arg(long, global = true)]
    source_dir: Option<PathBuf>,

    /// Directory of the vector index
    #[arg(long, global = true)]
    index_dir: Option<PathBuf>,

    /// Generative model provider (gemini, ollama, mock)
    #[arg(short, long, global = true)]
    provider: Option<String>,

    /// Generative model identifier
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Embedding provider (gemini, ollama, mock)
    #[arg(long, global = true)]
    embedding_provider: Option<String>,

    /// Embedding model identifier
    #[arg(long, global = true)]
    embedding_model: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Log line format (text, json)
    #[arg(long, global = true)]
    log_format: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build or extend the vector index from the source directory
    Index(IndexCommand),

    /// Ask a question and stream a cited answer
    Ask(AskCommand),

    /// Serve the HTTP API
    Serve(ServeCommand),

    /// Show index statistics
    Stats(StatsCommand),
}

impl Cli {
    fn overrides(&self) -> AppResult<CliOverrides> {
        let log_format = self
            .log_format
            .as_deref()
            .map(|s| {
                LogFormat::parse(s)
                    .ok_or_else(|| AppError::Config(format!("Unknown log format: {}", s)))
            })
            .transpose()?;

        Ok(CliOverrides {
            workspace: self.workspace.clone(),
            config_file: self.config.clone(),
            source_dir: self.source_dir.clone(),
            index_dir: self.index_dir.clone(),
            provider: self.provider.clone(),
            model: self.model.clone(),
            embedding_provider: self.embedding_provider.clone(),
            embedding_model: self.embedding_model.clone(),
            log_level: self.log_level.clone(),
            log_format,
            verbose: self.verbose,
            no_color: self.no_color,
        })
    }
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    // Load configuration from file and environment, then apply CLI overrides
    let config = AppConfig::load_with(cli.workspace.clone(), cli.config.clone())?
        .with_overrides(cli.overrides()?);

    logging::init_logging(config.log_level.as_deref(), config.log_format, config.no_color)?;

    tracing::info!("pdfchat starting");
    tracing::debug!("Workspace: {:?}", config.workspace);
    tracing::debug!("LLM: {}/{}", config.llm.provider, config.llm.model);
    tracing::debug!(
        "Embedding: {}/{}",
        config.embedding.provider,
        config.embedding.model
    );

    let command_name = match &cli.command {
        Commands::Index(_) => "index",
        Commands::Ask(_) => "ask",
        Commands::Serve(_) => "serve",
        Commands::Stats(_) => "stats",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Index(cmd) => cmd.execute(&config).await,
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Serve(cmd) => cmd.execute(&config).await,
        Commands::Stats(cmd) => cmd.execute(&config).await,
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
