//! Per-symbol synchronization state machine

use crate::error::{SyncError, SyncViolation};
use common::{DepthDiff, DepthSnapshot, Ts};
use lob::{BookDepth, OrderBook};
use std::collections::VecDeque;
use std::fmt;
use storage::{JournalRecord, RecordSink, StorageError};
use tracing::{debug, info, trace, warn};

/// Where a symbol is in its sync lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// No snapshot yet, diffs are buffered
    Unsynced,
    /// Snapshot loaded, buffered diffs being drained
    SnapshotLoaded,
    /// Snapshot loaded, no diff has bridged it yet
    AwaitingFirstValidEvent,
    /// Book is live
    Synced,
    /// Continuity lost, waiting for the driver to restart
    Resyncing,
}

impl SyncState {
    /// A snapshot has been loaded in the current attempt
    #[must_use]
    pub const fn is_ready(self) -> bool {
        matches!(
            self,
            Self::SnapshotLoaded | Self::AwaitingFirstValidEvent | Self::Synced
        )
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unsynced => "unsynced",
            Self::SnapshotLoaded => "snapshot-loaded",
            Self::AwaitingFirstValidEvent => "awaiting-first-event",
            Self::Synced => "synced",
            Self::Resyncing => "resyncing",
        };
        f.write_str(name)
    }
}

/// What happened to a single diff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    /// Held until the snapshot arrives
    Buffered,
    /// Applied to the book and persisted
    Applied,
    /// Entirely covered by the snapshot, skipped
    Stale,
    /// Dropped while a resync is pending
    Ignored,
}

/// Result of draining the pending buffer after a snapshot load
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Diffs that were waiting in the buffer
    pub buffered: usize,
    /// Of those, applied
    pub applied: usize,
    /// Of those, skipped as stale
    pub stale: usize,
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    /// Snapshots loaded
    pub snapshots_loaded: u64,
    /// Diffs applied
    pub diffs_applied: u64,
    /// Diffs skipped as stale
    pub diffs_stale: u64,
    /// Diffs dropped while resyncing
    pub diffs_ignored: u64,
    /// Resyncs requested
    pub resyncs: u64,
}

/// Applies the depth sync rules for one symbol
///
/// Diffs that arrive before the snapshot are buffered in arrival order. Once
/// the snapshot with id `L` is loaded, a diff with `u <= L` is stale, the
/// first applied diff must satisfy `U <= L + 1 <= u`, and every diff after
/// that must start at the previous `u + 1`. Anything else moves the machine
/// to [`SyncState::Resyncing`] and the caller is expected to [`reset`] and
/// start a new attempt.
///
/// [`reset`]: Synchronizer::reset
pub struct Synchronizer<S> {
    symbol: String,
    state: SyncState,
    book: OrderBook,
    sink: S,
    pending: VecDeque<DepthDiff>,
    max_buffered: usize,
    snapshot_update_id: Option<u64>,
    last_final_update_id: Option<u64>,
    stats: SyncStats,
}

impl<S: RecordSink> Synchronizer<S> {
    /// New synchronizer writing accepted records to `sink`
    ///
    /// `max_buffered` bounds the pending buffer; zero means unbounded.
    pub fn new(symbol: impl Into<String>, sink: S, max_buffered: usize) -> Self {
        Self {
            symbol: symbol.into(),
            state: SyncState::Unsynced,
            book: OrderBook::new(),
            sink,
            pending: VecDeque::new(),
            max_buffered,
            snapshot_update_id: None,
            last_final_update_id: None,
            stats: SyncStats::default(),
        }
    }

    /// Route a diff from the live stream
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Violation`] when the diff breaks continuity or the
    /// pending buffer overflows (a resync is requested before returning), and
    /// [`SyncError::Sink`] when persisting fails.
    pub fn on_diff_event(&mut self, diff: DepthDiff) -> Result<DiffOutcome, SyncError> {
        match self.state {
            SyncState::Unsynced => self.buffer(diff),
            SyncState::Resyncing => {
                self.stats.diffs_ignored += 1;
                trace!("{}: dropping diff {} while resyncing", self.symbol, diff.final_update_id);
                Ok(DiffOutcome::Ignored)
            }
            SyncState::SnapshotLoaded
            | SyncState::AwaitingFirstValidEvent
            | SyncState::Synced => self.apply_validated(diff),
        }
    }

    fn buffer(&mut self, diff: DepthDiff) -> Result<DiffOutcome, SyncError> {
        let capacity = self.max_buffered;
        if capacity > 0 && self.pending.len() >= capacity {
            return Err(self.violation(SyncViolation::BufferOverflow { capacity }));
        }
        self.pending.push_back(diff);
        Ok(DiffOutcome::Buffered)
    }

    /// Replace the book with `snapshot`, persist it, then drain the buffer
    ///
    /// A snapshot arriving while a resync is pending is discarded.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Sink`] if the snapshot or a drained diff cannot be
    /// persisted, and [`SyncError::Violation`] if a buffered diff breaks
    /// continuity.
    pub fn load_snapshot(
        &mut self,
        snapshot: DepthSnapshot,
        fetched_at: Ts,
    ) -> Result<DrainReport, SyncError> {
        if self.state == SyncState::Resyncing {
            debug!("{}: discarding snapshot {} during resync", self.symbol, snapshot.last_update_id);
            return Ok(DrainReport::default());
        }

        let snapshot_id = snapshot.last_update_id;
        self.book.apply_snapshot(&snapshot.bids, &snapshot.asks);
        self.sink.write_record(&JournalRecord::snapshot(fetched_at, snapshot))?;

        self.snapshot_update_id = Some(snapshot_id);
        self.last_final_update_id = None;
        self.state = SyncState::SnapshotLoaded;
        self.stats.snapshots_loaded += 1;

        let mut report = DrainReport {
            buffered: self.pending.len(),
            ..DrainReport::default()
        };
        info!(
            "{}: snapshot {} loaded, draining {} buffered diffs",
            self.symbol, snapshot_id, report.buffered
        );

        while let Some(diff) = self.pending.pop_front() {
            match self.apply_validated(diff)? {
                DiffOutcome::Applied => report.applied += 1,
                DiffOutcome::Stale => report.stale += 1,
                DiffOutcome::Buffered | DiffOutcome::Ignored => {}
            }
        }

        if self.state == SyncState::SnapshotLoaded {
            self.state = SyncState::AwaitingFirstValidEvent;
        }
        Ok(report)
    }

    /// Check a diff against the loaded snapshot and the last applied diff,
    /// then apply and persist it
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Violation`] on a continuity break (a resync is
    /// requested before returning), [`SyncError::Sink`] if persisting fails.
    pub fn apply_validated(&mut self, diff: DepthDiff) -> Result<DiffOutcome, SyncError> {
        let Some(snapshot_id) = self.snapshot_update_id else {
            return Err(self.violation(SyncViolation::SnapshotMissing));
        };

        if !diff.is_well_formed() {
            return Err(self.violation(SyncViolation::InvalidRange {
                first_update_id: diff.first_update_id,
                final_update_id: diff.final_update_id,
            }));
        }

        if diff.final_update_id <= snapshot_id {
            self.stats.diffs_stale += 1;
            trace!("{}: stale diff {} <= {}", self.symbol, diff.final_update_id, snapshot_id);
            return Ok(DiffOutcome::Stale);
        }

        match self.last_final_update_id {
            None => {
                let bridge = snapshot_id.saturating_add(1);
                if diff.first_update_id > bridge || diff.final_update_id < bridge {
                    return Err(self.violation(SyncViolation::FirstEventMisaligned {
                        snapshot_update_id: snapshot_id,
                        first_update_id: diff.first_update_id,
                        final_update_id: diff.final_update_id,
                    }));
                }
                info!(
                    "{}: first diff [{}, {}] bridges snapshot {}",
                    self.symbol, diff.first_update_id, diff.final_update_id, snapshot_id
                );
            }
            Some(last) => {
                let expected = last.saturating_add(1);
                if diff.first_update_id != expected {
                    return Err(self.violation(SyncViolation::SequenceGap {
                        expected,
                        got: diff.first_update_id,
                    }));
                }
            }
        }

        self.book.apply_diff(&diff);
        let final_update_id = diff.final_update_id;
        self.sink.write_record(&JournalRecord::diff(diff))?;
        self.last_final_update_id = Some(final_update_id);
        self.state = SyncState::Synced;
        self.stats.diffs_applied += 1;
        Ok(DiffOutcome::Applied)
    }

    /// Ask for a resync
    ///
    /// Returns `false` if one is already pending, in which case nothing
    /// changes.
    pub fn request_resync(&mut self, reason: &dyn fmt::Display) -> bool {
        if self.state == SyncState::Resyncing {
            debug!("{}: resync already pending, ignoring: {}", self.symbol, reason);
            return false;
        }
        warn!("{}: resync requested ({}): {}", self.symbol, self.state, reason);
        self.state = SyncState::Resyncing;
        self.stats.resyncs += 1;
        true
    }

    fn violation(&mut self, violation: SyncViolation) -> SyncError {
        self.request_resync(&violation);
        SyncError::Violation(violation)
    }

    /// Drop the buffer, the book and all continuity state
    ///
    /// Only call once the stream that fed the previous attempt has stopped.
    pub fn reset(&mut self) {
        if !self.pending.is_empty() {
            debug!("{}: discarding {} buffered diffs", self.symbol, self.pending.len());
        }
        self.pending.clear();
        self.book.clear();
        self.snapshot_update_id = None;
        self.last_final_update_id = None;
        self.state = SyncState::Unsynced;
    }

    /// Current state
    pub const fn state(&self) -> SyncState {
        self.state
    }

    /// Symbol this synchronizer tracks
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Current book
    pub const fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Best `n` levels per side
    pub fn top_levels(&self, n: usize) -> BookDepth {
        self.book.top_levels(n)
    }

    /// `lastUpdateId` of the loaded snapshot
    pub const fn snapshot_update_id(&self) -> Option<u64> {
        self.snapshot_update_id
    }

    /// `u` of the last applied diff
    pub const fn last_final_update_id(&self) -> Option<u64> {
        self.last_final_update_id
    }

    /// Diffs waiting for a snapshot
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lifetime counters
    pub const fn stats(&self) -> SyncStats {
        self.stats
    }

    /// Flush the record sink
    ///
    /// # Errors
    ///
    /// Returns the sink's error.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.sink.flush()
    }

    /// Record sink
    pub const fn sink(&self) -> &S {
        &self.sink
    }

    /// Give back the record sink
    pub fn into_sink(self) -> S {
        self.sink
    }
}
