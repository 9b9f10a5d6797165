//! InMemoryPubSub - 開発用の pub-sub
//!
//! # 実装詳細
//! - topic ごとに subscriber の `UnboundedSender` を保持
//! - publish 時に閉じた subscriber（drop された `Subscription`）を掃除する
//! - replay はしない：subscribe 前の publish は誰にも届かない

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::BrokerError;
use crate::ports::{PubSub, Subscription};

type Subscribers = HashMap<String, Vec<mpsc::UnboundedSender<Vec<u8>>>>;

#[derive(Default)]
pub struct InMemoryPubSub {
    topics: Mutex<Subscribers>,
    closed: AtomicBool,
}

impl InMemoryPubSub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live subscribers of `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        let topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        topics
            .get(topic)
            .map_or(0, |subs| subs.iter().filter(|tx| !tx.is_closed()).count())
    }

    /// Simulate the substrate going away: every subscription stream ends.
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
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
impl PubSub for InMemoryPubSub {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        self.ensure_open()?;
        let mut topics = self.topics.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(subs) = topics.get_mut(topic) {
            subs.retain(|tx| tx.send(payload.clone()).is_ok());
            if subs.is_empty() {
                topics.remove(topic);
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError> {
        self.ensure_open()?;
        let (tx, rx) = mpsc::unbounded_channel();
        self.topics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(Subscription::new(topic, rx))
    }
}
