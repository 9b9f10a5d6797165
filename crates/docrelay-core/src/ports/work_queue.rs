//! WorkQueue port - worker pool への配送キュー（Redis list または InMemory）
//!
//! # 設計原則
//! - FIFO、at-least-once
//! - item は serialize 済みの bytes（JobEnvelope の JSON）
//! - queue 名で複数キューを区別
//! - blocking pop（timeout 付き）

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::BrokerError;

/// Durable work queue consumed by the worker pool.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append an item to the tail of `queue`.
    async fn enqueue(&self, queue: &str, item: Vec<u8>) -> Result<(), BrokerError>;

    /// Pop the head of `queue`, waiting up to `timeout`.
    ///
    /// Returns `Ok(None)` if nothing arrived in time.
    async fn dequeue(&self, queue: &str, timeout: Duration) -> Result<Option<Vec<u8>>, BrokerError>;
}
