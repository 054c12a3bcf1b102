//! depthbook: record synchronized depth journals and replay them offline

#![deny(clippy::all)]
#![forbid(unsafe_code)]

mod record;
mod replay_cmd;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depthbook")]
#[command(about = "Binance depth-diff order book recorder and replayer")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true, env = "DEPTHBOOK_DEBUG")]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep books in sync and journal every validated update
    Record(record::RecordArgs),

    /// Rebuild a book from a journal and print the top levels
    Replay(replay_cmd::ReplayArgs),
}

fn init_logging(debug: bool) -> Result<()> {
    let level = if debug { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["depthbook", "feeds", "storage", "replay"] {
        filter = filter.add_directive(format!("{target}={level}").parse()?);
    }
    filter = filter.add_directive("lob=info".parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    match cli.command {
        Commands::Record(args) => record::run(args).await,
        Commands::Replay(args) => replay_cmd::run(&args),
    }
}
