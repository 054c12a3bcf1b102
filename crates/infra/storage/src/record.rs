//! Persisted record types

use common::{DepthDiff, DepthSnapshot, Ts};
use serde::{Deserialize, Serialize};

/// A line in the journal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JournalRecord {
    /// Full book as fetched at the start of a sync attempt
    Snapshot {
        /// Wall-clock fetch time, fractional seconds since UNIX epoch
        #[serde(default)]
        timestamp: f64,
        /// Snapshot payload
        data: DepthSnapshot,
    },
    /// A diff that passed continuity validation
    Diff {
        /// Diff payload
        data: DepthDiff,
    },
}

impl JournalRecord {
    /// Snapshot record stamped with `ts`
    #[must_use]
    pub fn snapshot(ts: Ts, data: DepthSnapshot) -> Self {
        Self::Snapshot {
            timestamp: ts.as_secs_f64(),
            data,
        }
    }

    /// Diff record
    #[must_use]
    pub const fn diff(data: DepthDiff) -> Self {
        Self::Diff { data }
    }

    /// Record tag as written on disk
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Snapshot { .. } => "snapshot",
            Self::Diff { .. } => "diff",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::PriceLevel;
    use rust_decimal_macros::dec;

    #[test]
    fn test_snapshot_line_shape() -> Result<(), Box<dyn std::error::Error>> {
        let record = JournalRecord::snapshot(
            Ts::from_millis(1_500),
            DepthSnapshot {
                last_update_id: 42,
                bids: vec![PriceLevel::new(dec!(100), dec!(1))],
                asks: vec![],
            },
        );
        let value: serde_json::Value = serde_json::to_value(&record)?;

        assert_eq!(value["type"], "snapshot");
        assert_eq!(value["timestamp"], 1.5);
        assert_eq!(value["data"]["lastUpdateId"], 42);
        assert_eq!(value["data"]["bids"][0][0], "100");
        Ok(())
    }

    #[test]
    fn test_reads_records_written_by_other_tools() -> Result<(), Box<dyn std::error::Error>> {
        let snapshot = r#"{"type": "snapshot", "timestamp": 1700000000.25, "data": {"lastUpdateId": 10, "bids": [["1.00", "2.00"]], "asks": []}}"#;
        let diff = r#"{"type": "diff", "data": {"e": "depthUpdate", "E": 1, "s": "BTCUSDT", "U": 11, "u": 12, "b": [], "a": [["1.10", "0.00"]]}}"#;

        let snapshot: JournalRecord = serde_json::from_str(snapshot)?;
        let diff: JournalRecord = serde_json::from_str(diff)?;

        assert_eq!(snapshot.kind(), "snapshot");
        match diff {
            JournalRecord::Diff { data } => {
                assert_eq!(data.first_update_id, 11);
                assert!(data.asks[0].qty.is_zero());
            }
            JournalRecord::Snapshot { .. } => panic!("expected a diff record"),
        }
        Ok(())
    }

    #[test]
    fn test_unknown_tag_is_rejected() {
        let result = serde_json::from_str::<JournalRecord>(r#"{"type":"trade","data":{}}"#);
        assert!(result.is_err());
    }
}
