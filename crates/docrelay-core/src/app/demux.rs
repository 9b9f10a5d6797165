//! Demultiplexer - 単一 subscription から Waiter への振り分け
//!
//! # 設計原則
//! - process 全体で subscription は 1 本（リクエストごとに subscribe しない）
//! - topic は固定、routing は payload 内の `taskId` で行う
//! - 振り分けは `TaskRegistry::resolve` を呼ぶだけ（同期・定数時間、await しない）
//! - 壊れた通知や宛先のない通知はログを残して捨てる。上位にエラーを返さない

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::registry::TaskRegistry;
use super::status::DemuxStats;
use crate::domain::{ResultNotification, TaskId};
use crate::ports::Subscription;

/// What happened to one incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    Routed(TaskId),
    /// Unknown, expired, or already resolved task id.
    Unroutable(TaskId),
    Malformed,
}

pub struct Demultiplexer {
    registry: Arc<TaskRegistry>,
    stats: Arc<DemuxStats>,
}

impl Demultiplexer {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self {
            registry,
            stats: Arc::new(DemuxStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<DemuxStats> {
        Arc::clone(&self.stats)
    }

    /// Route one raw message to its waiter.
    pub fn route(&self, raw: &[u8]) -> RouteOutcome {
        let notification = match ResultNotification::decode(raw) {
            Ok(n) => n,
            Err(e) => {
                self.stats.record_malformed();
                warn!(error = %e, bytes = raw.len(), "dropping malformed notification");
                return RouteOutcome::Malformed;
            }
        };

        let task_id = notification.task_id;
        let ok = notification.outcome.is_ok();
        if self.registry.resolve(task_id, notification.outcome) {
            self.stats.record_routed();
            debug!(task_id = %task_id, ok, "notification routed");
            RouteOutcome::Routed(task_id)
        } else {
            self.stats.record_unroutable();
            info!(task_id = %task_id, "dropping notification for unknown or finished task");
            RouteOutcome::Unroutable(task_id)
        }
    }

    pub fn spawn(
        self,
        subscription: Subscription,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(self.run(subscription, shutdown_rx))
    }

    /// Consume the subscription until shutdown or until the stream ends.
    pub async fn run(self, mut subscription: Subscription, mut shutdown_rx: watch::Receiver<bool>) {
        info!(topic = subscription.topic(), "demultiplexer started");
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                msg = subscription.next() => match msg {
                    Some(raw) => {
                        self.route(&raw);
                    }
                    None => {
                        warn!(topic = subscription.topic(), "result subscription closed");
                        break;
                    }
                },
            }
        }
        info!(topic = subscription.topic(), "demultiplexer stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Completion, TaskOutcome};
    use crate::impls::InMemoryPubSub;
    use crate::ports::PubSub;
    use serde_json::json;
    use std::time::Duration;
    use tracing_test::traced_test;
    use ulid::Ulid;

    fn id() -> TaskId {
        TaskId::from(Ulid::new())
    }

    fn demux() -> (Arc<TaskRegistry>, Demultiplexer) {
        let registry = Arc::new(TaskRegistry::new(Duration::from_secs(30)));
        let demux = Demultiplexer::new(Arc::clone(&registry));
        (registry, demux)
    }

    #[tokio::test]
    async fn routes_by_embedded_task_id() {
        let (registry, demux) = demux();
        let (a, b) = (id(), id());
        let wa = registry.register(a).unwrap();
        let wb = registry.register(b).unwrap();

        let raw = json!({"taskId": b.to_string(), "status": "ok", "data": "for b"}).to_string();
        assert_eq!(demux.route(raw.as_bytes()), RouteOutcome::Routed(b));

        assert!(registry.contains(a));
        assert_eq!(
            wb.wait().await,
            Some(Completion::Resolved(TaskOutcome::ok(json!("for b"))))
        );
        drop(wa);
    }

    #[traced_test]
    #[test]
    fn duplicate_notification_is_logged_and_dropped() {
        let (registry, demux) = demux();
        let task_id = id();
        let _waiter = registry.register(task_id).unwrap();

        let raw = json!({"taskId": task_id.to_string(), "result": {"page": 1}}).to_string();
        assert_eq!(demux.route(raw.as_bytes()), RouteOutcome::Routed(task_id));
        assert_eq!(demux.route(raw.as_bytes()), RouteOutcome::Unroutable(task_id));

        assert!(logs_contain("dropping notification for unknown or finished task"));
        let counts = demux.stats().snapshot();
        assert_eq!((counts.routed, counts.unroutable), (1, 1));
    }

    #[traced_test]
    #[test]
    fn malformed_message_does_not_touch_registry() {
        let (registry, demux) = demux();
        let task_id = id();
        let _waiter = registry.register(task_id).unwrap();

        assert_eq!(demux.route(b"{not json"), RouteOutcome::Malformed);
        assert!(registry.contains(task_id));
        assert!(logs_contain("dropping malformed notification"));
        assert_eq!(demux.stats().snapshot().malformed, 1);
    }

    #[tokio::test]
    async fn run_consumes_subscription_until_shutdown() {
        let (registry, demux) = demux();
        let bus = InMemoryPubSub::new();
        let sub = bus.subscribe("ocr_results").await.unwrap();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = demux.stats();
        let handle = demux.spawn(sub, shutdown_rx);

        let task_id = id();
        let waiter = registry.register(task_id).unwrap();
        let n = ResultNotification::new(task_id, TaskOutcome::ok(json!({"page": 1})));
        bus.publish("ocr_results", n.encode().unwrap()).await.unwrap();

        assert_eq!(
            waiter.wait().await,
            Some(Completion::Resolved(TaskOutcome::ok(json!({"page": 1}))))
        );
        assert_eq!(stats.snapshot().routed, 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(bus.subscriber_count("ocr_results"), 0);
    }

    #[tokio::test]
    async fn run_exits_when_stream_ends() {
        let (_registry, demux) = demux();
        let bus = InMemoryPubSub::new();
        let sub = bus.subscribe("ocr_results").await.unwrap();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = demux.spawn(sub, shutdown_rx);

        bus.close();
        handle.await.unwrap();
    }
}
