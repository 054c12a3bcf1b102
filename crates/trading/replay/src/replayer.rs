//! Journal replayer

use crate::error::ReplayError;
use lob::{BookDepth, OrderBook};
use std::path::Path;
use storage::{JournalReader, JournalRecord, StorageError};
use tracing::{debug, info, trace};

/// Replay configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayConfig {
    /// Stop after this many diffs (None = to end of journal)
    pub event_limit: Option<u64>,
}

impl ReplayConfig {
    /// Replay the whole journal
    #[must_use]
    pub const fn all() -> Self {
        Self { event_limit: None }
    }

    /// Replay at most `limit` diffs; zero means no limit
    #[must_use]
    pub const fn capped(limit: u64) -> Self {
        Self {
            event_limit: if limit == 0 { None } else { Some(limit) },
        }
    }
}

/// Reconstructed book and what it took to build it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Book as of the last applied record
    pub book: OrderBook,
    /// Diffs applied
    pub diffs_applied: u64,
    /// Snapshots loaded
    pub snapshots_loaded: u64,
    /// `u` of the last applied diff
    pub last_update_id: Option<u64>,
    /// Replay ended at the diff limit rather than end of journal
    pub stopped_at_limit: bool,
}

impl ReplaySummary {
    /// Best `n` levels per side
    #[must_use]
    pub fn top_levels(&self, n: usize) -> BookDepth {
        self.book.top_levels(n)
    }
}

/// Sequential journal consumer
#[derive(Debug, Default)]
pub struct Replayer {
    config: ReplayConfig,
    book: OrderBook,
    diffs_applied: u64,
    snapshots_loaded: u64,
    last_update_id: Option<u64>,
}

impl Replayer {
    /// Create a replayer with an empty book
    #[must_use]
    pub fn new(config: ReplayConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Apply one record
    ///
    /// Returns `false` once the diff limit has been reached; later records
    /// are not applied.
    pub fn apply(&mut self, record: &JournalRecord) -> bool {
        if self.limit_reached() {
            return false;
        }

        match record {
            JournalRecord::Snapshot { data, .. } => {
                self.book.apply_snapshot(&data.bids, &data.asks);
                self.snapshots_loaded += 1;
                debug!(
                    "Loaded snapshot {} ({} bids, {} asks)",
                    data.last_update_id,
                    self.book.bids.len(),
                    self.book.asks.len()
                );
            }
            JournalRecord::Diff { data } => {
                if self.snapshots_loaded == 0 && self.diffs_applied == 0 {
                    debug!("Diff {} precedes any snapshot, applying to empty book", data.final_update_id);
                }
                self.book.apply_diff(data);
                self.diffs_applied += 1;
                self.last_update_id = Some(data.final_update_id);
                trace!("Applied diff [{}, {}]", data.first_update_id, data.final_update_id);
            }
        }

        !self.limit_reached()
    }

    fn limit_reached(&self) -> bool {
        self.config
            .event_limit
            .is_some_and(|limit| self.diffs_applied >= limit)
    }

    /// Current book
    #[must_use]
    pub const fn book(&self) -> &OrderBook {
        &self.book
    }

    /// Diffs applied so far
    #[must_use]
    pub const fn diffs_applied(&self) -> u64 {
        self.diffs_applied
    }

    /// Replay numbered records until the limit or the end
    ///
    /// # Errors
    ///
    /// Returns [`ReplayError::Corrupt`] or [`ReplayError::Io`] on the first
    /// unreadable record, and [`ReplayError::Empty`] if no diff was applied.
    pub fn replay<I>(mut self, records: I) -> Result<ReplaySummary, ReplayError>
    where
        I: IntoIterator<Item = Result<(usize, JournalRecord), StorageError>>,
    {
        let (last_line, stopped_at_limit) = self.feed(records)?;
        self.finish(last_line, stopped_at_limit)
    }

    /// Apply records in order; returns the last line seen and whether the
    /// limit stopped the walk
    fn feed<I>(&mut self, records: I) -> Result<(usize, bool), ReplayError>
    where
        I: IntoIterator<Item = Result<(usize, JournalRecord), StorageError>>,
    {
        let mut last_line = 0;
        for item in records {
            let (line, record) = item?;
            last_line = line;
            if !self.apply(&record) {
                debug!("Diff limit reached at line {}", line);
                return Ok((last_line, true));
            }
        }
        Ok((last_line, false))
    }

    /// Replay the journal at `path`
    ///
    /// # Errors
    ///
    /// Same as [`Replayer::replay`], plus [`ReplayError::Io`] if the file
    /// cannot be opened.
    pub fn replay_file(mut self, path: &Path) -> Result<ReplaySummary, ReplayError> {
        info!("Replaying {}", path.display());
        let mut reader = JournalReader::open(path)?;
        let (_, stopped_at_limit) = self.feed(reader.by_ref())?;
        self.finish(reader.lines_read(), stopped_at_limit)
    }

    fn finish(self, lines: usize, stopped_at_limit: bool) -> Result<ReplaySummary, ReplayError> {
        if self.diffs_applied == 0 {
            return Err(ReplayError::Empty {
                snapshots: self.snapshots_loaded,
                lines,
            });
        }

        info!(
            "Replay finished: {} diffs, {} snapshots, last update id {}",
            self.diffs_applied,
            self.snapshots_loaded,
            self.last_update_id.unwrap_or_default()
        );

        Ok(ReplaySummary {
            book: self.book,
            diffs_applied: self.diffs_applied,
            snapshots_loaded: self.snapshots_loaded,
            last_update_id: self.last_update_id,
            stopped_at_limit,
        })
    }
}
