//! Live sync driver: subscribe, warm up, snapshot, then keep the book synced

use crate::config::FeedConfig;
use crate::error::{FeedError, SessionError, SyncError, SyncViolation};
use crate::source::{DiffStream, DiffStreamSource, SnapshotSource};
use crate::sync::synchronizer::{SyncState, SyncStats, Synchronizer};
use common::{PriceLevel, Ts};
use futures_util::StreamExt;
use lob::BookDepth;
use parking_lot::Mutex;
use std::sync::Arc;
use storage::{RecordSink, StorageError};
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval, sleep};
use tracing::{debug, error, info};

/// Why the stream consumer stopped
#[derive(Debug)]
enum ConsumerExit {
    Violation(SyncViolation),
    Disconnected(Option<FeedError>),
    Sink(StorageError),
}

/// How a sync attempt ended
#[derive(Debug)]
enum AttemptEnd {
    Shutdown,
    Resync(String),
}

/// Summary returned when a session stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    /// Sync attempts started
    pub attempts: u64,
    /// Synchronizer counters at shutdown
    pub stats: SyncStats,
}

/// Keeps one symbol's book in sync with the exchange until shutdown
///
/// Each attempt subscribes to the diff stream, lets it buffer for
/// `snapshot_delay_ms`, fetches the snapshot and hands it to the
/// [`Synchronizer`]. The stream is consumed on its own task; both sides go
/// through the same lock so buffering and applying never interleave. Any
/// continuity break, stream failure or snapshot failure ends the attempt:
/// the consumer is stopped, the synchronizer reset, and after
/// `reconnect_delay_ms` a new attempt starts. Only this driver restarts,
/// so at most one resync is ever in flight.
pub struct SyncSession<S> {
    symbol: String,
    config: FeedConfig,
    snapshots: Arc<dyn SnapshotSource>,
    stream: Arc<dyn DiffStreamSource>,
    sync: Arc<Mutex<Synchronizer<S>>>,
}

impl<S: RecordSink + 'static> SyncSession<S> {
    /// Session for `symbol`, persisting through `sink`
    pub fn new(
        symbol: impl Into<String>,
        config: FeedConfig,
        snapshots: Arc<dyn SnapshotSource>,
        stream: Arc<dyn DiffStreamSource>,
        sink: S,
    ) -> Self {
        let symbol = symbol.into().to_uppercase();
        let sync = Synchronizer::new(symbol.clone(), sink, config.max_buffered);
        Self {
            symbol,
            config,
            snapshots,
            stream,
            sync: Arc::new(Mutex::new(sync)),
        }
    }

    /// Symbol, upper-cased
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Current sync state
    pub fn state(&self) -> SyncState {
        self.sync.lock().state()
    }

    /// Best `n` levels per side of the live book
    pub fn top_levels(&self, n: usize) -> BookDepth {
        self.sync.lock().top_levels(n)
    }

    /// Run `f` against the synchronizer under its lock
    pub fn inspect<R>(&self, f: impl FnOnce(&Synchronizer<S>) -> R) -> R {
        let sync = self.sync.lock();
        f(&*sync)
    }

    /// Take back the sink once the session has stopped
    ///
    /// Returns `None` while a stream consumer still holds the synchronizer.
    pub fn into_sink(self) -> Option<S> {
        Arc::try_unwrap(self.sync)
            .ok()
            .map(|sync| sync.into_inner().into_sink())
    }

    /// Sync until `shutdown` turns `true` (or its sender is dropped)
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Sink`] if a record cannot be persisted; every
    /// other failure is retried.
    pub async fn run(
        &self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<SessionReport, SessionError> {
        info!(
            "{}: starting {} depth sync (limit {}, warm-up {:?})",
            self.symbol,
            self.config.name,
            self.config.depth_limit,
            self.config.snapshot_delay()
        );

        let mut attempts = 0u64;
        loop {
            if *shutdown.borrow() {
                break;
            }
            attempts += 1;
            debug!("{}: sync attempt #{}", self.symbol, attempts);

            match self.sync_attempt(&mut shutdown).await? {
                AttemptEnd::Shutdown => break,
                AttemptEnd::Resync(reason) => {
                    self.sync.lock().reset();
                    info!(
                        "{}: restarting in {:?} after: {}",
                        self.symbol,
                        self.config.reconnect_delay(),
                        reason
                    );
                }
            }

            tokio::select! {
                () = sleep(self.config.reconnect_delay()) => {}
                () = wait_for_shutdown(&mut shutdown) => break,
            }
        }

        let stats = {
            let mut sync = self.sync.lock();
            sync.flush()?;
            sync.stats()
        };
        info!(
            "{}: stopped after {} attempts ({} snapshots, {} diffs applied, {} resyncs)",
            self.symbol, attempts, stats.snapshots_loaded, stats.diffs_applied, stats.resyncs
        );
        Ok(SessionReport { attempts, stats })
    }

    async fn sync_attempt(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<AttemptEnd, SessionError> {
        let stream = tokio::select! {
            result = self.stream.subscribe(&self.symbol) => match result {
                Ok(stream) => stream,
                Err(e) => {
                    error!("{}: subscribe failed: {}", self.symbol, e);
                    return Ok(self.abandon_attempt(format!("subscribe failed: {e}")));
                }
            },
            () = wait_for_shutdown(shutdown) => return Ok(AttemptEnd::Shutdown),
        };

        let (exit_tx, mut exit_rx) = mpsc::channel(1);
        let consumer = tokio::spawn(consume(stream, Arc::clone(&self.sync), exit_tx));

        let end = self.drive(shutdown, &mut exit_rx).await;

        consumer.abort();
        if let Err(e) = consumer.await {
            if e.is_panic() {
                error!("{}: stream consumer panicked: {}", self.symbol, e);
            }
        }
        end
    }

    async fn drive(
        &self,
        shutdown: &mut watch::Receiver<bool>,
        exits: &mut mpsc::Receiver<ConsumerExit>,
    ) -> Result<AttemptEnd, SessionError> {
        // Diffs buffer while the stream warms up
        tokio::select! {
            () = sleep(self.config.snapshot_delay()) => {}
            exit = exits.recv() => return self.consumer_stopped(exit),
            () = wait_for_shutdown(shutdown) => return Ok(AttemptEnd::Shutdown),
        }

        let snapshot = tokio::select! {
            result = self.snapshots.fetch(&self.symbol, self.config.depth_limit) => match result {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!("{}: snapshot fetch failed: {}", self.symbol, e);
                    return Ok(self.abandon_attempt(format!("snapshot fetch failed: {e}")));
                }
            },
            exit = exits.recv() => return self.consumer_stopped(exit),
            () = wait_for_shutdown(shutdown) => return Ok(AttemptEnd::Shutdown),
        };
        info!(
            "{}: fetched snapshot {} ({} bids, {} asks)",
            self.symbol,
            snapshot.last_update_id,
            snapshot.bids.len(),
            snapshot.asks.len()
        );

        let loaded = self.sync.lock().load_snapshot(snapshot, Ts::now());
        match loaded {
            Ok(report) => debug!(
                "{}: drained {} buffered diffs ({} applied, {} stale)",
                self.symbol, report.buffered, report.applied, report.stale
            ),
            Err(SyncError::Violation(v)) => return Ok(AttemptEnd::Resync(v.to_string())),
            Err(SyncError::Sink(e)) => return Err(e.into()),
        }

        let mut status = interval(self.config.status_interval());
        status.set_missed_tick_behavior(MissedTickBehavior::Delay);
        status.tick().await;

        loop {
            tokio::select! {
                exit = exits.recv() => return self.consumer_stopped(exit),
                () = wait_for_shutdown(shutdown) => return Ok(AttemptEnd::Shutdown),
                _ = status.tick() => self.log_status(),
            }
        }
    }

    fn consumer_stopped(&self, exit: Option<ConsumerExit>) -> Result<AttemptEnd, SessionError> {
        match exit {
            Some(ConsumerExit::Violation(v)) => Ok(AttemptEnd::Resync(v.to_string())),
            Some(ConsumerExit::Sink(e)) => Err(SessionError::Sink(e)),
            Some(ConsumerExit::Disconnected(Some(e))) => {
                Ok(self.abandon_attempt(format!("diff stream failed: {e}")))
            }
            Some(ConsumerExit::Disconnected(None)) | None => {
                Ok(self.abandon_attempt("diff stream closed".to_string()))
            }
        }
    }

    /// Mark the synchronizer for resync and end the attempt
    fn abandon_attempt(&self, reason: String) -> AttemptEnd {
        self.sync.lock().request_resync(&reason);
        AttemptEnd::Resync(reason)
    }

    fn log_status(&self) {
        let sync = self.sync.lock();
        let book = sync.book();
        let stats = sync.stats();
        info!(
            "{}: {} | update id {} | bid {} | ask {} | {} bid / {} ask levels | {} diffs applied",
            self.symbol,
            sync.state(),
            sync.last_final_update_id()
                .or(sync.snapshot_update_id())
                .unwrap_or_default(),
            format_level(book.best_bid()),
            format_level(book.best_ask()),
            book.bids.len(),
            book.asks.len(),
            stats.diffs_applied
        );
    }
}

fn format_level(level: Option<PriceLevel>) -> String {
    level.map_or_else(|| "-".to_string(), |l| format!("{} x {}", l.price, l.qty))
}

/// Feed the synchronizer until the stream ends or continuity breaks
async fn consume<S: RecordSink>(
    mut stream: DiffStream,
    sync: Arc<Mutex<Synchronizer<S>>>,
    exit: mpsc::Sender<ConsumerExit>,
) {
    let reason = loop {
        let diff = match stream.next().await {
            Some(Ok(diff)) => diff,
            Some(Err(e)) => break ConsumerExit::Disconnected(Some(e)),
            None => break ConsumerExit::Disconnected(None),
        };

        let outcome = sync.lock().on_diff_event(diff);
        match outcome {
            Ok(_) => {}
            Err(SyncError::Violation(v)) => break ConsumerExit::Violation(v),
            Err(SyncError::Sink(e)) => break ConsumerExit::Sink(e),
        }
    };
    // Receiver is gone once the attempt has already ended
    let _ = exit.send(reason).await;
}

/// Resolves once shutdown is flagged or the sender is dropped
async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    loop {
        if *shutdown.borrow_and_update() {
            return;
        }
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
