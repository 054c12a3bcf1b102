//! Snapshot + diff synchronization
//!
//! [`Synchronizer`] is the state machine that decides, for each diff, whether
//! it is buffered, applied, skipped as stale, or breaks continuity.
//! [`SyncSession`] drives it against live sources and owns the resync loop.

pub mod session;
pub mod synchronizer;

pub use session::{SessionReport, SyncSession};
pub use synchronizer::{DiffOutcome, DrainReport, SyncState, SyncStats, Synchronizer};
