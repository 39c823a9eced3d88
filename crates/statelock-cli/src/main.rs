use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use statelock_cli::commands::{MemoryCommand, SessionCommand, StatsCommand, TagsCommand};
use statelock_cli::context::CliContext;
use statelock_cli::error::CliResult;
use statelock_cli::output::OutputFormat;

#[derive(Parser)]
#[command(name = "statelock-cli")]
#[command(about = "StateLock CLI - Management tool for a local StateLock store")]
#[command(version)]
pub struct Cli {
    #[clap(long, short, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[clap(long, short = 'd', global = true, help = "Path to data directory")]
    pub data_dir: Option<PathBuf>,

    #[clap(long, short = 'c', global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    #[clap(about = "Memory management commands")]
    Memory(MemoryCommand),

    #[clap(about = "Session export, import and deletion")]
    Session(SessionCommand),

    #[clap(about = "Show store statistics")]
    Stats(StatsCommand),

    #[clap(about = "List tags by frequency")]
    Tags(TagsCommand),
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run() -> CliResult<()> {
    let cli = Cli::parse();
    init_logging();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Table
    };

    let ctx = CliContext::open(cli.config.as_deref(), cli.data_dir.clone()).await?;

    match &cli.command {
        Command::Memory(cmd) => cmd.execute(&ctx, format).await,
        Command::Session(cmd) => cmd.execute(&ctx, format).await,
        Command::Stats(cmd) => cmd.execute(&ctx, format).await,
        Command::Tags(cmd) => cmd.execute(&ctx, format).await,
    }
}

/// Warnings only unless RUST_LOG says otherwise, on stderr so `--json`
/// output stays clean
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
