// ============================================================================
// File: src/main.rs
// Entry point and CLI handling
// ============================================================================

mod chat_client;
mod citation;
mod config;
mod debug_log;
mod display;
mod export;
mod line_codec;
mod log_fetcher;
mod models;
mod orchestrator;
mod repl;
mod session;
mod stream;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, Secrets};
use crate::orchestrator::SearchOrchestrator;

/// Command-line arguments for the news search front-end
#[derive(Parser, Debug)]
#[command(name = "newsroom-search")]
#[command(about = "Search news with a streaming AI answer, with a debug log panel", long_about = None)]
struct Args {
    /// Path to the JSON configuration file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Path to the JSON secrets file (AWS credentials for the server log viewer)
    #[arg(short, long, default_value = "secrets.json")]
    secrets: PathBuf,

    /// Run a single search and exit instead of starting the interactive prompt
    #[arg(short, long)]
    query: Option<String>,

    /// Record stream diagnostics in the system log even if the config disables them
    #[arg(short, long)]
    debug: bool,

    /// Mirror the system log to stderr
    #[arg(short, long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        format!("warn,{}=debug", env!("CARGO_CRATE_NAME"))
    } else {
        "warn".to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    // Load configuration and secrets
    let mut config = Config::load(&args.config)?;
    if args.debug {
        config.diagnostics = true;
    }
    let secrets = Secrets::load(&args.secrets);
    tracing::info!(
        endpoint = %config.search_endpoint,
        secrets_found = secrets.present_keys().len(),
        "Configuration loaded"
    );

    let mut orchestrator = SearchOrchestrator::new(config, &secrets)?;

    match args.query {
        Some(question) => orchestrator.search(&question).await,
        None => orchestrator.run_interactive().await?,
    }

    Ok(())
}
