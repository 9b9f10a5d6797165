//! PubSub port - 結果通知の publish / subscribe
//!
//! # 設計原則
//! - best-effort 配送、replay なし（subscribe 前に publish されたものは届かない）
//! - process 全体で subscription は 1 本だけ張る（Demultiplexer が所有する）
//! - `Subscription` を drop すると unsubscribe される

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::BrokerError;

#[async_trait]
pub trait PubSub: Send + Sync {
    /// Publish `payload` to every live subscriber of `topic`.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Open a subscription to `topic`.
    async fn subscribe(&self, topic: &str) -> Result<Subscription, BrokerError>;
}

/// Stream of messages for one topic.
///
/// Adapters forward their connection's messages into the channel; the
/// stream ends when the sending side is dropped.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, rx: mpsc::UnboundedReceiver<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            rx,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the subscription is closed.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_ends_when_sender_drops() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut sub = Subscription::new("results", rx);
        tx.send(b"one".to_vec()).unwrap();
        drop(tx);

        assert_eq!(sub.topic(), "results");
        assert_eq!(sub.next().await, Some(b"one".to_vec()));
        assert_eq!(sub.next().await, None);
    }
}
