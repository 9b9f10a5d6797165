//! InMemoryWorkQueue - 開発用の work queue
//!
//! # 実装詳細
//! - queue 名ごとに `VecDeque<Vec<u8>>` と `Notify` を持つ
//! - `Notify` を queue ごとに分けるのは、別 queue の push で permit を取り合わないため
//! - `close()` で substrate 障害を模擬できる（以降の enqueue は `BrokerError::Closed`）

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use crate::domain::BrokerError;
use crate::ports::WorkQueue;

#[derive(Default)]
struct Lane {
    items: VecDeque<Vec<u8>>,
    notify: Arc<Notify>,
}

#[derive(Default)]
pub struct InMemoryWorkQueue {
    lanes: Mutex<HashMap<String, Lane>>,
    closed: AtomicBool,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of items currently waiting in `queue`.
    pub async fn len(&self, queue: &str) -> usize {
        let lanes = self.lanes.lock().await;
        lanes.get(queue).map_or(0, |lane| lane.items.len())
    }

    /// Simulate the substrate going away.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        // dequeue 待ちを起こして Closed を返させる
        let lanes = self.lanes.lock().await;
        for lane in lanes.values() {
            lane.notify.notify_waiters();
        }
    }

    fn ensure_open(&self) -> Result<(), BrokerError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrokerError::Closed)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, queue: &str, item: Vec<u8>) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let notify = {
            let mut lanes = self.lanes.lock().await;
            let lane = lanes.entry(queue.to_string()).or_default();
            lane.items.push_back(item);
            Arc::clone(&lane.notify)
        };
        // lock の外で通知
        notify.notify_one();
        Ok(())
    }

    async fn dequeue(
        &self,
        queue: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BrokerError> {
        let deadline = Instant::now() + timeout;
        loop {
            self.ensure_open()?;
            let notify = {
                let mut lanes = self.lanes.lock().await;
                let lane = lanes.entry(queue.to_string()).or_default();
                if let Some(item) = lane.items.pop_front() {
                    return Ok(Some(item));
                }
                Arc::clone(&lane.notify)
            };

            tokio::select! {
                _ = notify.notified() => {},
                _ = tokio::time::sleep_until(deadline) => return Ok(None),
            }
        }
    }
}
