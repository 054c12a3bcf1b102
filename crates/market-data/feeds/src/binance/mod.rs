//! Binance spot depth feed
//!
//! Snapshots come from `GET /api/v3/depth`, diffs from the `<symbol>@depth`
//! WebSocket stream.

pub mod websocket;

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::source::{DiffStream, DiffStreamSource, SnapshotSource};
use common::DepthSnapshot;
use tracing::debug;

/// Binance REST + WebSocket depth source
pub struct BinanceFeed {
    config: FeedConfig,
    client: reqwest::Client,
}

impl BinanceFeed {
    /// Create a feed with its own HTTP client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: FeedConfig) -> Result<Self, FeedError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self { config, client })
    }

    /// Feed configuration
    #[must_use]
    pub const fn config(&self) -> &FeedConfig {
        &self.config
    }

    fn depth_url(&self) -> String {
        format!("{}/api/v3/depth", self.config.api_url.trim_end_matches('/'))
    }

    fn stream_url(&self) -> String {
        format!("{}/ws", self.config.ws_url.trim_end_matches('/'))
    }
}

#[async_trait::async_trait]
impl SnapshotSource for BinanceFeed {
    async fn fetch(&self, symbol: &str, depth_limit: u32) -> Result<DepthSnapshot, FeedError> {
        let url = self.depth_url();
        debug!("GET {} symbol={} limit={}", url, symbol, depth_limit);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("symbol", symbol.to_uppercase()),
                ("limit", depth_limit.to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(FeedError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl DiffStreamSource for BinanceFeed {
    async fn subscribe(&self, symbol: &str) -> Result<DiffStream, FeedError> {
        let stream_name = websocket::depth_stream_name(symbol, self.config.fast_updates);
        websocket::subscribe_depth(&self.stream_url(), &stream_name).await
    }
}
