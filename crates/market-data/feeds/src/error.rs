//! Feed and synchronization errors

use storage::StorageError;
use tokio_tungstenite::tungstenite;

/// Transport or decoding failure talking to an exchange
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// HTTP client failure (connect, timeout, body)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Snapshot endpoint answered with a non-success status
    #[error("snapshot request returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body, as returned
        body: String,
    },

    /// WebSocket failure
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tungstenite::Error>),

    /// Message could not be decoded
    #[error("failed to decode feed message: {0}")]
    Decode(#[from] serde_json::Error),

    /// Any other transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl From<tungstenite::Error> for FeedError {
    fn from(e: tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(e))
    }
}

/// Broken update-id continuity; recovered by a resync, never fatal
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncViolation {
    /// First diff after the snapshot does not straddle `lastUpdateId + 1`
    #[error(
        "first diff [{first_update_id}, {final_update_id}] does not cover snapshot id {snapshot_update_id} + 1"
    )]
    FirstEventMisaligned {
        /// Snapshot `lastUpdateId`
        snapshot_update_id: u64,
        /// Diff `U`
        first_update_id: u64,
        /// Diff `u`
        final_update_id: u64,
    },

    /// A diff does not start right after the last applied one
    #[error("sequence gap: expected first update id {expected}, got {got}")]
    SequenceGap {
        /// `lastFinalUpdateId + 1`
        expected: u64,
        /// Diff `U`
        got: u64,
    },

    /// Diff with `U > u`
    #[error("malformed diff range [{first_update_id}, {final_update_id}]")]
    InvalidRange {
        /// Diff `U`
        first_update_id: u64,
        /// Diff `u`
        final_update_id: u64,
    },

    /// Too many diffs buffered while waiting for the snapshot
    #[error("pending buffer full at {capacity} diffs before the snapshot arrived")]
    BufferOverflow {
        /// Configured buffer capacity
        capacity: usize,
    },

    /// A diff reached validation before any snapshot was loaded
    #[error("diff validated without a loaded snapshot")]
    SnapshotMissing,
}

/// Outcome of feeding the synchronizer
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Continuity broken, a resync has been requested
    #[error(transparent)]
    Violation(#[from] SyncViolation),

    /// Record sink failed
    #[error("record sink failed: {0}")]
    Sink(#[from] StorageError),
}

/// Fatal session failure
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Record sink failed; persisted history would have a hole
    #[error("record sink failed: {0}")]
    Sink(#[from] StorageError),
}
