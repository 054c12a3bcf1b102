//! `record` command: one live sync session per symbol

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Args;
use feeds::{BinanceFeed, FeedConfig, SessionError, SessionReport, SyncSession};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use storage::Journal;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

#[derive(Args, Debug, Clone)]
pub struct RecordArgs {
    /// Symbols to record (comma-separated)
    #[arg(long, env = "DEPTHBOOK_SYMBOLS", value_delimiter = ',', default_value = "BTCUSDT")]
    pub symbols: Vec<String>,

    /// Directory for `<symbol>_diffs.jsonl` journals
    #[arg(long, env = "DEPTHBOOK_OUT_DIR", default_value = ".")]
    pub out_dir: PathBuf,

    /// Use the Binance spot testnet
    #[arg(long, env = "DEPTHBOOK_TESTNET")]
    pub testnet: bool,

    /// Override the WebSocket base URL
    #[arg(long, env = "DEPTHBOOK_WS_URL")]
    pub ws_url: Option<String>,

    /// Override the REST base URL
    #[arg(long, env = "DEPTHBOOK_API_URL")]
    pub api_url: Option<String>,

    /// Snapshot depth per side
    #[arg(long, env = "DEPTHBOOK_DEPTH_LIMIT", default_value_t = 1000)]
    pub depth_limit: u32,

    /// Subscribe to 100ms diffs instead of 1s
    #[arg(long, env = "DEPTHBOOK_FAST_UPDATES")]
    pub fast_updates: bool,

    /// Pause between sync attempts (ms, floored at 100)
    #[arg(long, env = "DEPTHBOOK_RECONNECT_DELAY_MS", default_value_t = 5000)]
    pub reconnect_delay_ms: u64,

    /// Stream warm-up before the snapshot request (ms)
    #[arg(long, env = "DEPTHBOOK_SNAPSHOT_DELAY_MS", default_value_t = 2000)]
    pub snapshot_delay_ms: u64,

    /// Diffs buffered while waiting for a snapshot (0 = unbounded)
    #[arg(long, env = "DEPTHBOOK_MAX_BUFFERED", default_value_t = 10_000)]
    pub max_buffered: usize,

    /// Status log interval (ms)
    #[arg(long, env = "DEPTHBOOK_STATUS_INTERVAL_MS", default_value_t = 30_000)]
    pub status_interval_ms: u64,

    /// Snapshot request timeout (ms)
    #[arg(long, env = "DEPTHBOOK_REQUEST_TIMEOUT_MS", default_value_t = 10_000)]
    pub request_timeout_ms: u64,
}

impl RecordArgs {
    fn feed_config(&self) -> FeedConfig {
        let base = if self.testnet {
            FeedConfig::binance_testnet()
        } else {
            FeedConfig::binance_spot()
        };
        FeedConfig {
            ws_url: self.ws_url.clone().unwrap_or(base.ws_url),
            api_url: self.api_url.clone().unwrap_or(base.api_url),
            depth_limit: self.depth_limit,
            fast_updates: self.fast_updates,
            reconnect_delay_ms: self.reconnect_delay_ms,
            snapshot_delay_ms: self.snapshot_delay_ms,
            max_buffered: self.max_buffered,
            status_interval_ms: self.status_interval_ms,
            request_timeout_ms: self.request_timeout_ms,
            name: base.name,
        }
    }

    fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            let symbol = symbol.trim().to_uppercase();
            if !symbol.is_empty() && !symbols.contains(&symbol) {
                symbols.push(symbol);
            }
        }
        symbols
    }
}

/// `btcusdt_diffs.jsonl`
pub fn journal_path(out_dir: &Path, symbol: &str) -> PathBuf {
    out_dir.join(format!("{}_diffs.jsonl", symbol.to_lowercase()))
}

type SessionOutcome = (String, SyncSession<Journal>, Result<SessionReport, SessionError>);

pub async fn run(args: RecordArgs) -> Result<()> {
    let symbols = args.symbols();
    if symbols.is_empty() {
        anyhow::bail!("no symbols to record");
    }

    let config = args.feed_config();
    info!("depthbook recorder");
    info!("==================");
    info!("Started: {}", Utc::now().format("%Y-%m-%d %H:%M:%S UTC"));
    info!("Feed: {} ({})", config.name, config.api_url);
    info!("Symbols: {}", symbols.join(", "));

    let feed = Arc::new(BinanceFeed::new(config.clone())?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut sessions = JoinSet::new();

    for symbol in symbols {
        let path = journal_path(&args.out_dir, &symbol);
        let journal = Journal::open(&path)
            .with_context(|| format!("failed to open journal {}", path.display()))?;
        let session = SyncSession::new(
            symbol.clone(),
            config.clone(),
            feed.clone(),
            feed.clone(),
            journal,
        );
        let shutdown = shutdown_rx.clone();
        sessions.spawn(async move {
            let result = session.run(shutdown).await;
            (symbol, session, result)
        });
    }

    let mut failures = 0usize;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            info!("Ctrl-C received, stopping sessions");
        }
        Some(joined) = sessions.join_next() => {
            if let Err(e) = finish_session(joined) {
                error!("{:#}", e);
                failures += 1;
            }
            warn!("A session stopped on its own, stopping the rest");
        }
    }

    shutdown_tx.send_replace(true);
    while let Some(joined) = sessions.join_next().await {
        if let Err(e) = finish_session(joined) {
            error!("{:#}", e);
            failures += 1;
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} session(s) failed");
    }
    info!("All journals closed");
    Ok(())
}

fn finish_session(joined: Result<SessionOutcome, JoinError>) -> Result<()> {
    let (symbol, session, result) = joined.context("session task failed")?;
    let report = result.with_context(|| format!("{symbol}: session failed"))?;
    info!(
        "{}: {} attempts, {} snapshots, {} diffs applied, {} resyncs",
        symbol,
        report.attempts,
        report.stats.snapshots_loaded,
        report.stats.diffs_applied,
        report.stats.resyncs
    );

    let journal = session
        .into_sink()
        .with_context(|| format!("{symbol}: journal still in use"))?;
    journal
        .close()
        .with_context(|| format!("{symbol}: failed to close journal"))
}
