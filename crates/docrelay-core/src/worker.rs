//! Worker - queue を消費して結果を publish する側
//!
//! dequeue → envelope decode → `DocumentProcessor::process` → ResultNotification を result topic に publish。
//! 結果の行き先は topic と payload 内の `taskId` だけで決まり、どの gateway が待っているかは知りません。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::domain::{JobEnvelope, ResultNotification, TaskId, TaskOutcome};
use crate::ports::{PubSub, WorkQueue};

/// Turns one document into an outcome. Failures are reported as `TaskOutcome::Error`.
#[async_trait]
pub trait DocumentProcessor: Send + Sync {
    async fn process(&self, task_id: TaskId, document: &[u8]) -> TaskOutcome;
}

/// Worker group handle.
/// - `request_shutdown()` で新しい dequeue を止める（処理中の document は最後まで publish する）
/// - `shutdown_and_join()` で全ワーカーの終了を待てる
pub struct WorkerGroup {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl WorkerGroup {
    /// Spawn `config.concurrency` workers (at least one).
    pub fn spawn(
        config: WorkerConfig,
        queue: Arc<dyn WorkQueue>,
        pubsub: Arc<dyn PubSub>,
        processor: Arc<dyn DocumentProcessor>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = Arc::new(config);
        let n = config.concurrency.max(1);

        let mut joins = Vec::with_capacity(n);
        for worker_id in 0..n {
            let ctx = WorkerContext {
                worker_id,
                config: Arc::clone(&config),
                queue: Arc::clone(&queue),
                pubsub: Arc::clone(&pubsub),
                processor: Arc::clone(&processor),
            };
            joins.push(tokio::spawn(worker_loop(ctx, shutdown_rx.clone())));
        }
        info!(workers = n, queue = %config.queue_name, "worker group started");

        Self { shutdown_tx, joins }
    }

    pub fn request_shutdown(&self) {
        // ignore send error: receivers may already be dropped
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        for j in self.joins {
            let _ = j.await;
        }
    }
}

struct WorkerContext {
    worker_id: usize,
    config: Arc<WorkerConfig>,
    queue: Arc<dyn WorkQueue>,
    pubsub: Arc<dyn PubSub>,
    processor: Arc<dyn DocumentProcessor>,
}

async fn worker_loop(ctx: WorkerContext, mut shutdown_rx: watch::Receiver<bool>) {
    let worker_id = ctx.worker_id;
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let item = tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
            item = ctx.queue.dequeue(&ctx.config.queue_name, ctx.config.dequeue_timeout) => item,
        };

        let raw = match item {
            Ok(Some(raw)) => raw,
            Ok(None) => continue,
            Err(e) => {
                error!(worker_id, error = %e, "dequeue failed, worker stopping");
                break;
            }
        };

        let envelope = match JobEnvelope::decode(&raw) {
            Ok(env) => env,
            Err(e) => {
                // taskId が読めないので誰にも返せない。gateway 側は timeout になる
                warn!(worker_id, error = %e, "skipping undecodable envelope");
                continue;
            }
        };

        let task_id = envelope.task_id();
        debug!(worker_id, task_id = %task_id, bytes = envelope.payload().len(), "processing document");
        let outcome = ctx.processor.process(task_id, envelope.payload()).await;

        let notification = ResultNotification::new(task_id, outcome);
        let bytes = match notification.encode() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!(worker_id, task_id = %task_id, error = %e, "failed to encode result");
                continue;
            }
        };
        if let Err(e) = ctx.pubsub.publish(&ctx.config.result_topic, bytes).await {
            error!(worker_id, task_id = %task_id, error = %e, "failed to publish result");
        }
    }
    debug!(worker_id, "worker stopped");
}
