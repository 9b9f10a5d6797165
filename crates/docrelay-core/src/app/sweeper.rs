//! Sweeper - deadline を過ぎた Waiter を expire する
//!
//! # フロー
//! 1. `expire_due(now)` で期限切れをまとめて TimedOut にする
//! 2. 次の deadline まで sleep（busy polling しない）
//! 3. より早い deadline が登録されたら `Notify` で起こされる
//! 4. shutdown 信号で抜ける

use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::registry::TaskRegistry;

pub struct Sweeper {
    registry: Arc<TaskRegistry>,
}

impl Sweeper {
    pub fn new(registry: Arc<TaskRegistry>) -> Self {
        Self { registry }
    }

    pub fn spawn(self, shutdown_rx: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown_rx))
    }

    pub async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            for task_id in self.registry.expire_due(Instant::now()) {
                warn!(task_id = %task_id, "no result before deadline, waiter expired");
            }

            let next = self.registry.next_deadline();
            let sleep = async {
                match next {
                    Some(deadline) => tokio::time::sleep_until(deadline).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = self.registry.deadline_changed().notified() => {}
                _ = sleep => {}
            }
        }
        debug!("sweeper stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Completion, TaskId, TaskOutcome};
    use std::time::Duration;
    use ulid::Ulid;

    fn id() -> TaskId {
        TaskId::from(Ulid::new())
    }

    #[tokio::test(start_paused = true)]
    async fn expires_waiter_at_its_deadline() {
        let registry = Arc::new(TaskRegistry::new(Duration::from_millis(200)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Sweeper::new(Arc::clone(&registry)).spawn(shutdown_rx);

        let start = Instant::now();
        let waiter = registry.register(id()).unwrap();
        assert_eq!(waiter.wait().await, Some(Completion::Expired));

        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(250));
        assert!(registry.is_empty());

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn earlier_registration_wakes_sweeper() {
        let registry = Arc::new(TaskRegistry::new(Duration::from_secs(60)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Sweeper::new(Arc::clone(&registry)).spawn(shutdown_rx);

        // sweeper は 60s 先の deadline で寝ている
        let _slow = registry.register(id()).unwrap();
        tokio::task::yield_now().await;

        // waiter を await しないので、expire できるのは sweeper だけ
        let fast_id = id();
        let _fast = registry
            .register_until(fast_id, Instant::now() + Duration::from_millis(50))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert!(!registry.contains(fast_id));
        assert_eq!(registry.counts().timed_out, 1);
        assert_eq!(registry.len(), 1);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn resolved_waiters_are_left_alone() {
        let registry = Arc::new(TaskRegistry::new(Duration::from_millis(100)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Sweeper::new(Arc::clone(&registry)).spawn(shutdown_rx);

        let task_id = id();
        let waiter = registry.register(task_id).unwrap();
        assert!(registry.resolve(task_id, TaskOutcome::ok(serde_json::json!(1))));

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(matches!(waiter.wait().await, Some(Completion::Resolved(_))));
        assert_eq!(registry.counts().timed_out, 0);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_shutdown_sender_is_dropped() {
        let registry = Arc::new(TaskRegistry::new(Duration::from_secs(1)));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = Sweeper::new(registry).spawn(shutdown_rx);

        drop(shutdown_tx);
        handle.await.unwrap();
    }
}
