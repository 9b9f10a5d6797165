//! Bridge - 起動済みの request/response bridge
//!
//! Gateway・Demultiplexer・Sweeper が 1 つの TaskRegistry を共有します。
//! `shutdown()` は先に registry を閉じてからループを止めます。待っている submit も、
//! shutdown 後に残った Gateway の clone からの submit も `SubmitError::Shutdown` で返ります。

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use super::demux::Demultiplexer;
use super::gateway::Gateway;
use super::registry::TaskRegistry;
use super::status::{DemuxCounts, DemuxStats, RegistryCounts};
use super::sweeper::Sweeper;
use crate::config::BridgeConfig;
use crate::domain::{Submission, SubmitError};
use crate::ports::{IdGenerator, Subscription, WorkQueue};

pub struct Bridge {
    registry: Arc<TaskRegistry>,
    gateway: Gateway,
    demux_stats: Arc<DemuxStats>,
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl Bridge {
    pub(crate) fn spawn(
        config: BridgeConfig,
        queue: Arc<dyn WorkQueue>,
        ids: Arc<dyn IdGenerator>,
        subscription: Subscription,
    ) -> Self {
        let registry = Arc::new(TaskRegistry::new(config.submit_timeout));
        let gateway = Gateway::new(Arc::clone(&registry), queue, ids, &config);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let demux = Demultiplexer::new(Arc::clone(&registry));
        let demux_stats = demux.stats();
        let joins = vec![
            demux.spawn(subscription, shutdown_rx.clone()),
            Sweeper::new(Arc::clone(&registry)).spawn(shutdown_rx),
        ];

        Self {
            registry,
            gateway,
            demux_stats,
            shutdown_tx,
            joins,
        }
    }

    /// Clonable submit handle for request handlers.
    pub fn gateway(&self) -> Gateway {
        self.gateway.clone()
    }

    pub async fn submit(&self, payload: impl Into<Vec<u8>>) -> Result<Submission, SubmitError> {
        self.gateway.submit(payload).await
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn registry_counts(&self) -> RegistryCounts {
        self.registry.counts()
    }

    pub fn demux_counts(&self) -> DemuxCounts {
        self.demux_stats.snapshot()
    }

    /// Release every pending waiter, refuse new submissions, then stop both loops.
    pub async fn shutdown(self) {
        let released = self.registry.close_all();
        // receiver が先に落ちていても構わない
        let _ = self.shutdown_tx.send(true);
        for j in self.joins {
            let _ = j.await;
        }
        info!(released, "bridge stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::BridgeBuilder;
    use crate::domain::{ResultNotification, TaskOutcome};
    use crate::impls::{InMemoryPubSub, InMemoryWorkQueue};
    use crate::ports::PubSub;
    use serde_json::json;
    use std::time::Duration;

    async fn start(pubsub: Arc<InMemoryPubSub>) -> Bridge {
        start_with(pubsub, Arc::new(InMemoryWorkQueue::new())).await
    }

    async fn start_with(pubsub: Arc<InMemoryPubSub>, queue: Arc<InMemoryWorkQueue>) -> Bridge {
        BridgeBuilder::new(BridgeConfig::default().with_submit_timeout(Duration::from_secs(5)))
            .queue(queue)
            .pubsub(pubsub)
            .start()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn shutdown_releases_waiting_submissions() {
        let bridge = start(Arc::new(InMemoryPubSub::new())).await;
        let gateway = bridge.gateway();
        let pending = tokio::spawn(async move { gateway.submit(b"doc".to_vec()).await });

        while bridge.registry().is_empty() {
            tokio::task::yield_now().await;
        }
        let registry = Arc::clone(bridge.registry());
        bridge.shutdown().await;

        assert!(matches!(pending.await.unwrap(), Err(SubmitError::Shutdown)));
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn retained_gateway_fails_fast_after_shutdown() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let bridge = start_with(Arc::new(InMemoryPubSub::new()), queue.clone()).await;
        let gateway = bridge.gateway();
        let registry = Arc::clone(bridge.registry());
        bridge.shutdown().await;

        let res = tokio::time::timeout(Duration::from_millis(10), gateway.submit(b"doc".to_vec()))
            .await
            .expect("submit after shutdown must not wait");
        assert!(matches!(res, Err(SubmitError::Shutdown)));
        assert!(registry.is_empty());
        assert_eq!(queue.len("ocr_queue").await, 0);
    }

    #[tokio::test]
    async fn counts_track_routing() {
        let pubsub = Arc::new(InMemoryPubSub::new());
        let bridge = start(pubsub.clone()).await;

        let stray = ResultNotification::new(
            crate::domain::TaskId::from(ulid::Ulid::new()),
            TaskOutcome::ok(json!(null)),
        );
        pubsub
            .publish("ocr_results", stray.encode().unwrap())
            .await
            .unwrap();
        pubsub
            .publish("ocr_results", b"garbage".to_vec())
            .await
            .unwrap();

        while bridge.demux_counts().malformed == 0 {
            tokio::task::yield_now().await;
        }
        let counts = bridge.demux_counts();
        assert_eq!(counts.unroutable, 1);
        assert_eq!(counts.malformed, 1);
        assert_eq!(bridge.registry_counts().dropped, 1);
        bridge.shutdown().await;
    }
}
