//! StateLock daemon - HTTP memory service for agent runtimes

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use statelock_server::api::ApiServer;
use statelock_server::config::Config;
use statelock_server::embedding;
use statelock_server::error::Result;
use statelock_server::memory::{EngineConfig, MemoryEngine, SystemClock};
use statelock_server::storage::LanceStore;
use statelock_server::validation::Limits;

/// StateLock - session-scoped memory with hybrid retrieval
#[derive(Parser)]
#[command(name = "statelock")]
#[command(about = "Session-scoped memory retrieval service for agents")]
#[command(version)]
pub struct Cli {
    /// Path to config file
    #[arg(long, short = 'c', global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server (default command)
    #[command(name = "serve")]
    Serve,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => serve(cli.config).await,
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,statelock_server=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn serve(config_path: Option<PathBuf>) -> Result<()> {
    tracing::info!("Starting StateLock daemon");

    let config = Config::load(config_path.as_deref())?;
    tracing::debug!("Config loaded: {:?}", config.storage);

    tracing::info!(
        provider = %config.embedding.provider,
        model = %config.embedding.model,
        "Initializing embedding provider"
    );
    let embedder = embedding::from_config(&config.embedding)?;

    let data_dir = &config.storage.data_dir;
    tracing::info!("Initializing storage at: {}", data_dir.display());
    let store = LanceStore::open_or_create(data_dir, &config.storage.table, embedder.dimension())
        .await?;

    let engine = MemoryEngine::new(
        Arc::new(store),
        embedder,
        Arc::new(SystemClock),
        EngineConfig::from(&config.query),
    );

    let server = ApiServer::new(
        engine,
        Limits::from(&config.limits),
        config.server.clone(),
    );
    server.serve().await
}
