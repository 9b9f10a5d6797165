//! Status - 観測用のカウンタ
//!
//! registry と demultiplexer の状態をスナップショットとして返します。
//! leak 検出（pending が減らない）や重複 notification の把握に使います。

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Snapshot of the task registry.
///
/// `pending` is the live entry count; the rest are totals since start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub pending: usize,
    pub fulfilled: u64,
    pub timed_out: u64,
    /// Notifications for unknown or already finished task ids.
    pub dropped: u64,
    /// Waiters removed without an outcome (caller gave up, shutdown).
    pub cancelled: u64,
}

/// Counters kept by the demultiplexer.
#[derive(Debug, Default)]
pub struct DemuxStats {
    routed: AtomicU64,
    unroutable: AtomicU64,
    malformed: AtomicU64,
}

impl DemuxStats {
    pub(crate) fn record_routed(&self) {
        self.routed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unroutable(&self) {
        self.unroutable.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DemuxCounts {
        DemuxCounts {
            routed: self.routed.load(Ordering::Relaxed),
            unroutable: self.unroutable.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DemuxCounts {
    pub routed: u64,
    pub unroutable: u64,
    pub malformed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_events() {
        let stats = DemuxStats::default();
        stats.record_routed();
        stats.record_routed();
        stats.record_unroutable();
        stats.record_malformed();

        assert_eq!(
            stats.snapshot(),
            DemuxCounts {
                routed: 2,
                unroutable: 1,
                malformed: 1
            }
        );
    }

    #[test]
    fn registry_counts_serialize_flat() {
        let v = serde_json::to_value(RegistryCounts::default()).unwrap();
        assert_eq!(
            v,
            serde_json::json!({"pending": 0, "fulfilled": 0, "timed_out": 0, "dropped": 0, "cancelled": 0})
        );
    }
}
