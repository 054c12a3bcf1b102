//! Session tests against scripted snapshot and stream sources

use common::{DepthDiff, DepthSnapshot, PriceLevel};
use feeds::{
    DiffStream, DiffStreamSource, FeedConfig, FeedError, SnapshotSource, SyncSession, SyncState,
    Synchronizer,
};
use futures_util::StreamExt;
use futures_util::stream;
use parking_lot::Mutex;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use storage::JournalRecord;
use tokio::sync::watch;
use tokio::time::sleep;

type Records = Vec<JournalRecord>;

/// Hands out scripted snapshot results, one per fetch, then repeats the
/// last snapshot
struct ScriptedSnapshots {
    replies: Mutex<VecDeque<Result<DepthSnapshot, FeedError>>>,
    last: Mutex<Option<DepthSnapshot>>,
    calls: AtomicUsize,
}

impl ScriptedSnapshots {
    fn new(replies: Vec<Result<DepthSnapshot, FeedError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl SnapshotSource for ScriptedSnapshots {
    async fn fetch(&self, _symbol: &str, _depth_limit: u32) -> Result<DepthSnapshot, FeedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().pop_front() {
            Some(Ok(snapshot)) => {
                *self.last.lock() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .clone()
                .ok_or_else(|| FeedError::Transport("no snapshot scripted".to_string())),
        }
    }
}

/// Each subscription replays the next script, then stays open
struct ScriptedStreams {
    scripts: Mutex<VecDeque<Vec<Result<DepthDiff, FeedError>>>>,
    subscriptions: AtomicUsize,
}

impl ScriptedStreams {
    fn new(scripts: Vec<Vec<Result<DepthDiff, FeedError>>>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            subscriptions: AtomicUsize::new(0),
        })
    }
}

#[async_trait::async_trait]
impl DiffStreamSource for ScriptedStreams {
    async fn subscribe(&self, _symbol: &str) -> Result<DiffStream, FeedError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        let script = self.scripts.lock().pop_front().unwrap_or_default();
        Ok(stream::iter(script).chain(stream::pending()).boxed())
    }
}

/// Every subscription is refused
struct RefusingStreams {
    subscriptions: AtomicUsize,
}

#[async_trait::async_trait]
impl DiffStreamSource for RefusingStreams {
    async fn subscribe(&self, _symbol: &str) -> Result<DiffStream, FeedError> {
        self.subscriptions.fetch_add(1, Ordering::SeqCst);
        Err(FeedError::Transport("handshake refused".to_string()))
    }
}

fn snapshot(id: u64) -> DepthSnapshot {
    DepthSnapshot {
        last_update_id: id,
        bids: vec![PriceLevel::new(dec!(100), dec!(1))],
        asks: vec![PriceLevel::new(dec!(101), dec!(1))],
    }
}

fn diff(first: u64, last: u64) -> Result<DepthDiff, FeedError> {
    Ok(DepthDiff::new(
        first,
        last,
        vec![PriceLevel::new(dec!(99.5), dec!(2))],
        vec![],
    ))
}

fn fast_config() -> FeedConfig {
    FeedConfig {
        snapshot_delay_ms: 20,
        reconnect_delay_ms: 10,
        max_buffered: 100,
        ..FeedConfig::binance_testnet()
    }
}

async fn wait_until(
    session: &SyncSession<Records>,
    done: impl Fn(&Synchronizer<Records>) -> bool,
) -> bool {
    for _ in 0..300 {
        if session.inspect(&done) {
            return true;
        }
        sleep(Duration::from_millis(10)).await;
    }
    false
}

fn record_kinds(records: &[JournalRecord]) -> Vec<&'static str> {
    records.iter().map(JournalRecord::kind).collect()
}

#[tokio::test]
async fn test_session_syncs_buffered_diffs() -> Result<(), Box<dyn std::error::Error>> {
    let snapshots = ScriptedSnapshots::new(vec![Ok(snapshot(150))]);
    let streams = ScriptedStreams::new(vec![vec![diff(140, 145), diff(146, 151), diff(152, 153)]]);
    let session = Arc::new(SyncSession::new(
        "btcusdt",
        fast_config(),
        snapshots.clone(),
        streams.clone(),
        Records::new(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.run(shutdown_rx).await }
    });

    assert!(wait_until(&session, |s| s.last_final_update_id() == Some(153)).await);
    assert_eq!(session.symbol(), "BTCUSDT");
    assert_eq!(session.state(), SyncState::Synced);
    assert_eq!(session.top_levels(1).bids, vec![PriceLevel::new(dec!(100), dec!(1))]);

    shutdown_tx.send(true)?;
    let report = task.await??;
    assert_eq!(report.attempts, 1);
    assert_eq!(report.stats.snapshots_loaded, 1);
    assert_eq!(report.stats.diffs_applied, 2);
    assert_eq!(report.stats.diffs_stale, 1);
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 1);

    let session = Arc::try_unwrap(session).map_err(|_| "session still shared")?;
    let records = session.into_sink().ok_or("sink still shared")?;
    assert_eq!(record_kinds(&records), vec!["snapshot", "diff", "diff"]);
    Ok(())
}

#[tokio::test]
async fn test_gap_resyncs_from_fresh_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let snapshots = ScriptedSnapshots::new(vec![Ok(snapshot(100)), Ok(snapshot(200))]);
    let streams = ScriptedStreams::new(vec![
        vec![diff(101, 101), diff(103, 104)],
        vec![diff(199, 201), diff(202, 202)],
    ]);
    let session = Arc::new(SyncSession::new(
        "ETHUSDT",
        fast_config(),
        snapshots.clone(),
        streams.clone(),
        Records::new(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.run(shutdown_rx).await }
    });

    assert!(wait_until(&session, |s| s.last_final_update_id() == Some(202)).await);
    shutdown_tx.send(true)?;
    let report = task.await??;

    assert_eq!(report.attempts, 2);
    assert_eq!(report.stats.resyncs, 1);
    assert_eq!(streams.subscriptions.load(Ordering::SeqCst), 2);

    let session = Arc::try_unwrap(session).map_err(|_| "session still shared")?;
    let records = session.into_sink().ok_or("sink still shared")?;
    assert_eq!(
        record_kinds(&records),
        vec!["snapshot", "diff", "snapshot", "diff", "diff"]
    );
    Ok(())
}

#[tokio::test]
async fn test_snapshot_failure_retries() -> Result<(), Box<dyn std::error::Error>> {
    let snapshots = ScriptedSnapshots::new(vec![
        Err(FeedError::Status {
            status: 429,
            body: "too many requests".to_string(),
        }),
        Ok(snapshot(10)),
    ]);
    let streams = ScriptedStreams::new(vec![vec![diff(11, 12)], vec![diff(11, 12)]]);
    let session = Arc::new(SyncSession::new(
        "BNBUSDT",
        fast_config(),
        snapshots.clone(),
        streams,
        Records::new(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.run(shutdown_rx).await }
    });

    assert!(wait_until(&session, |s| s.state() == SyncState::Synced).await);
    shutdown_tx.send(true)?;
    let report = task.await??;

    assert_eq!(report.attempts, 2);
    assert_eq!(report.stats.resyncs, 1);
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 2);
    assert_eq!(report.stats.snapshots_loaded, 1);
    Ok(())
}

#[tokio::test]
async fn test_stream_end_triggers_resync() -> Result<(), Box<dyn std::error::Error>> {
    let snapshots = ScriptedSnapshots::new(vec![Ok(snapshot(20))]);
    let streams = ScriptedStreams::new(vec![
        vec![diff(11, 11), Err(FeedError::Transport("connection reset".to_string()))],
        vec![diff(21, 22)],
    ]);
    let session = Arc::new(SyncSession::new(
        "BTCUSDT",
        fast_config(),
        snapshots,
        streams,
        Records::new(),
    ));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let task = tokio::spawn({
        let session = Arc::clone(&session);
        async move { session.run(shutdown_rx).await }
    });

    assert!(wait_until(&session, |s| s.last_final_update_id() == Some(22)).await);
    shutdown_tx.send(true)?;
    let report = task.await??;
    assert_eq!(report.stats.resyncs, 1);
    Ok(())
}

#[tokio::test]
async fn test_shutdown_during_warm_up() -> Result<(), Box<dyn std::error::Error>> {
    let snapshots = ScriptedSnapshots::new(vec![Ok(snapshot(1))]);
    let streams = ScriptedStreams::new(vec![]);
    let session = SyncSession::new(
        "BTCUSDT",
        FeedConfig {
            snapshot_delay_ms: 60_000,
            ..FeedConfig::binance_testnet()
        },
        snapshots.clone(),
        streams,
        Records::new(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (report, sent) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(5), session.run(shutdown_rx)),
        async {
            sleep(Duration::from_millis(50)).await;
            shutdown_tx.send(true)
        }
    );
    sent?;

    let report = report??;
    assert_eq!(report.attempts, 1);
    assert_eq!(snapshots.calls.load(Ordering::SeqCst), 0);
    assert_eq!(session.state(), SyncState::Unsynced);
    Ok(())
}

#[tokio::test]
async fn test_zero_reconnect_delay_still_paces_retries() -> Result<(), Box<dyn std::error::Error>>
{
    let streams = Arc::new(RefusingStreams {
        subscriptions: AtomicUsize::new(0),
    });
    let session = SyncSession::new(
        "BTCUSDT",
        FeedConfig {
            reconnect_delay_ms: 0,
            ..fast_config()
        },
        ScriptedSnapshots::new(vec![]),
        streams.clone(),
        Records::new(),
    );
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (report, sent) = tokio::join!(
        tokio::time::timeout(Duration::from_secs(5), session.run(shutdown_rx)),
        async {
            sleep(Duration::from_millis(250)).await;
            shutdown_tx.send(true)
        }
    );
    sent?;

    let report = report??;
    let subscriptions = streams.subscriptions.load(Ordering::SeqCst);
    assert!((1..=4).contains(&subscriptions), "{subscriptions} subscribe attempts");
    assert_eq!(report.stats.resyncs, subscriptions as u64);
    assert_eq!(report.stats.snapshots_loaded, 0);
    Ok(())
}
