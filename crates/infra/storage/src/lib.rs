//! Append-only journal of depth snapshots and validated diffs
//!
//! One JSON record per line, file order is arrival order:
//! `{"type":"snapshot","timestamp":..,"data":{..}}` and
//! `{"type":"diff","data":{..}}`.

#![deny(clippy::all)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod journal;
pub mod record;

pub use error::StorageError;
pub use journal::{Journal, JournalReader, RecordSink};
pub use record::JournalRecord;
