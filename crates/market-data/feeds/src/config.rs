//! Feed configuration

use std::time::Duration;

/// Floor on the pause between sync attempts
pub const MIN_RECONNECT_DELAY_MS: u64 = 100;

/// Feed configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Feed name, used in logs
    pub name: String,
    /// WebSocket base URL
    pub ws_url: String,
    /// REST API base URL
    pub api_url: String,
    /// Levels per side requested with each snapshot
    pub depth_limit: u32,
    /// Subscribe to the 100ms diff stream instead of the 1s one
    pub fast_updates: bool,
    /// Pause before each new sync attempt, in milliseconds
    pub reconnect_delay_ms: u64,
    /// Time the diff stream runs before the snapshot is requested
    pub snapshot_delay_ms: u64,
    /// Diffs held while waiting for a snapshot before forcing a resync
    pub max_buffered: usize,
    /// Status log interval, in milliseconds
    pub status_interval_ms: u64,
    /// Snapshot request timeout, in milliseconds
    pub request_timeout_ms: u64,
}

impl FeedConfig {
    /// Binance spot production endpoints
    #[must_use]
    pub fn binance_spot() -> Self {
        Self {
            name: "binance".to_string(),
            ws_url: "wss://stream.binance.com:9443".to_string(),
            api_url: "https://api.binance.com".to_string(),
            depth_limit: 1000,
            fast_updates: false,
            reconnect_delay_ms: 5000,
            snapshot_delay_ms: 2000,
            max_buffered: 10_000,
            status_interval_ms: 30_000,
            request_timeout_ms: 10_000,
        }
    }

    /// Binance spot testnet endpoints
    #[must_use]
    pub fn binance_testnet() -> Self {
        Self {
            name: "binance-testnet".to_string(),
            ws_url: "wss://testnet.binance.vision".to_string(),
            api_url: "https://testnet.binance.vision".to_string(),
            ..Self::binance_spot()
        }
    }

    /// Pause between sync attempts, never shorter than
    /// [`MIN_RECONNECT_DELAY_MS`]
    #[must_use]
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms.max(MIN_RECONNECT_DELAY_MS))
    }

    /// Stream warm-up before the snapshot request
    #[must_use]
    pub const fn snapshot_delay(&self) -> Duration {
        Duration::from_millis(self.snapshot_delay_ms)
    }

    /// Status log interval, never shorter than one second
    #[must_use]
    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms.max(1_000))
    }

    /// Snapshot request timeout
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::binance_spot()
    }
}
