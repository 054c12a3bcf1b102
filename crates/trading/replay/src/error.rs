//! Replay errors

use storage::StorageError;

/// Why a replay produced no book
#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    /// Journal could not be read
    #[error("failed to read journal: {0}")]
    Io(#[from] std::io::Error),

    /// A line is not a valid record
    #[error("corrupt record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number
        line: usize,
        /// Decoder message
        reason: String,
    },

    /// No diff was applied; the journal is empty or holds only snapshots
    #[error("no diff events were applied ({snapshots} snapshots in {lines} lines)")]
    Empty {
        /// Snapshots seen
        snapshots: u64,
        /// Lines consumed; a journal file counts blank lines too, a record
        /// iterator reports the line of its last record
        lines: usize,
    },
}

impl From<StorageError> for ReplayError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Io(e) => Self::Io(e),
            StorageError::Corrupt { line, reason } => Self::Corrupt { line, reason },
            StorageError::Encode(e) => Self::Corrupt {
                line: 0,
                reason: e.to_string(),
            },
        }
    }
}
