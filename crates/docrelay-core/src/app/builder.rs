//! BridgeBuilder - bridge の構築とワイヤリング
//!
//! 起動時に検証します（Fail-fast）。queue / pub-sub が渡されていない、設定が不正、
//! result topic に subscribe できない、のどれかなら `start()` が BuildError を返します。

use std::sync::Arc;

use tracing::info;

use super::bridge::Bridge;
use crate::config::BridgeConfig;
use crate::domain::BrokerError;
use crate::ports::{IdGenerator, PubSub, SystemClock, UlidGenerator, WorkQueue};

/// BridgeBuilder は Bridge を組み立てる
///
/// # 使用例
/// ```ignore
/// let bridge = BridgeBuilder::new(BridgeConfig::default())
///     .queue(queue)
///     .pubsub(pubsub)
///     .start()
///     .await?;
/// ```
pub struct BridgeBuilder {
    config: BridgeConfig,
    queue: Option<Arc<dyn WorkQueue>>,
    pubsub: Option<Arc<dyn PubSub>>,
    ids: Option<Arc<dyn IdGenerator>>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("no work queue configured")]
    MissingQueue,

    #[error("no pub-sub configured")]
    MissingPubSub,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to subscribe to result topic: {0}")]
    Subscribe(#[source] BrokerError),
}

impl BridgeBuilder {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            config,
            queue: None,
            pubsub: None,
            ids: None,
        }
    }

    pub fn queue(mut self, queue: Arc<dyn WorkQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn pubsub(mut self, pubsub: Arc<dyn PubSub>) -> Self {
        self.pubsub = Some(pubsub);
        self
    }

    /// 省略時は `UlidGenerator<SystemClock>`
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// 検証して Demultiplexer と Sweeper を起動する
    ///
    /// subscribe は最初の submit より前に終わっているので、起動直後の通知も取りこぼしません。
    pub async fn start(self) -> Result<Bridge, BuildError> {
        self.config.validate().map_err(BuildError::InvalidConfig)?;
        let queue = self.queue.ok_or(BuildError::MissingQueue)?;
        let pubsub = self.pubsub.ok_or(BuildError::MissingPubSub)?;
        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(SystemClock)));

        let subscription = pubsub
            .subscribe(&self.config.result_topic)
            .await
            .map_err(BuildError::Subscribe)?;

        info!(
            queue = %self.config.queue_name,
            topic = %self.config.result_topic,
            timeout_ms = self.config.submit_timeout.as_millis() as u64,
            "bridge starting"
        );
        Ok(Bridge::spawn(self.config, queue, ids, subscription))
    }
}
