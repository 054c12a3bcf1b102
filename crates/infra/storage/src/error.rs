//! Storage error types

/// Errors from writing or reading a journal
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Filesystem failure
    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Record could not be encoded
    #[error("failed to encode journal record: {0}")]
    Encode(#[from] serde_json::Error),

    /// A persisted line is not a valid record
    #[error("corrupt journal record at line {line}: {reason}")]
    Corrupt {
        /// 1-based line number in the file
        line: usize,
        /// Decoder message
        reason: String,
    },
}
