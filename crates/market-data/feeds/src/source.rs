//! Snapshot and diff-stream source traits

use crate::error::FeedError;
use common::{DepthDiff, DepthSnapshot};
use futures_util::stream::BoxStream;

/// Live stream of depth diffs in exchange order
///
/// Ends (`None`) when the connection closes; an `Err` item means the
/// connection is no longer trustworthy and the consumer should resync.
pub type DiffStream = BoxStream<'static, Result<DepthDiff, FeedError>>;

/// Full-depth snapshot provider (REST)
#[async_trait::async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Fetch up to `depth_limit` levels per side for `symbol`
    async fn fetch(&self, symbol: &str, depth_limit: u32) -> Result<DepthSnapshot, FeedError>;
}

/// Depth-diff stream provider (WebSocket)
#[async_trait::async_trait]
pub trait DiffStreamSource: Send + Sync {
    /// Open a new diff stream for `symbol`
    async fn subscribe(&self, symbol: &str) -> Result<DiffStream, FeedError>;
}
