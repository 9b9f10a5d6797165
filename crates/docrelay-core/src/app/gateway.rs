//! Gateway - submission の受付
//!
//! # フロー
//! 1. payload を検証（空・サイズ超過は何も queue しないで失敗）
//! 2. TaskId を生成
//! 3. Waiter を登録（enqueue より前。worker の publish に先を越されないため）
//! 4. JobEnvelope を enqueue
//! 5. Waiter の完了を待つ（result / worker error / timeout のどれか 1 つ）
//!
//! どの経路で抜けても Waiter の drop で registry から消えます（caller の cancel を含む）。
//! retry はしません。retry するかどうかは caller が決めます。

use std::sync::Arc;

use tracing::{debug, warn};

use super::registry::TaskRegistry;
use crate::config::BridgeConfig;
use crate::domain::{
    BrokerError, Completion, JobEnvelope, RegistryError, Submission, SubmitError, TaskOutcome,
};
use crate::ports::{IdGenerator, WorkQueue};

/// Request-side entry point. Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct Gateway {
    registry: Arc<TaskRegistry>,
    queue: Arc<dyn WorkQueue>,
    ids: Arc<dyn IdGenerator>,
    queue_name: Arc<str>,
    max_payload_bytes: usize,
}

impl Gateway {
    pub(crate) fn new(
        registry: Arc<TaskRegistry>,
        queue: Arc<dyn WorkQueue>,
        ids: Arc<dyn IdGenerator>,
        config: &BridgeConfig,
    ) -> Self {
        Self {
            registry,
            queue,
            ids,
            queue_name: Arc::from(config.queue_name.as_str()),
            max_payload_bytes: config.max_payload_bytes,
        }
    }

    /// Submit a document and wait for the worker's result.
    pub async fn submit(&self, payload: impl Into<Vec<u8>>) -> Result<Submission, SubmitError> {
        let payload = payload.into();
        self.validate(&payload)?;

        let task_id = self.ids.generate_task_id();
        let waiter = match self.registry.register(task_id) {
            Ok(waiter) => waiter,
            Err(RegistryError::Closed) => return Err(SubmitError::Shutdown),
            Err(e) => return Err(e.into()),
        };

        let item = JobEnvelope::new(task_id, payload)
            .encode()
            .map_err(|e| SubmitError::Enqueue {
                task_id,
                source: BrokerError::OperationFailed(format!("encode envelope: {e}")),
            })?;

        if let Err(source) = self.queue.enqueue(&self.queue_name, item).await {
            warn!(task_id = %task_id, error = %source, "enqueue failed");
            return Err(SubmitError::Enqueue { task_id, source });
        }
        debug!(task_id = %task_id, queue = %self.queue_name, "task enqueued");

        match waiter.wait().await {
            Some(Completion::Resolved(TaskOutcome::Ok { data })) => Ok(Submission {
                task_id,
                result: data,
            }),
            Some(Completion::Resolved(TaskOutcome::Error { message, details })) => {
                Err(SubmitError::Worker {
                    task_id,
                    message,
                    details,
                })
            }
            Some(Completion::Expired) => Err(SubmitError::Timeout {
                task_id,
                timeout_ms: self.registry.default_timeout().as_millis() as u64,
            }),
            None => Err(SubmitError::Shutdown),
        }
    }

    fn validate(&self, payload: &[u8]) -> Result<(), SubmitError> {
        if payload.is_empty() {
            return Err(SubmitError::Validation("Document data is missing".into()));
        }
        if payload.len() > self.max_payload_bytes {
            return Err(SubmitError::Validation(format!(
                "Document is too large ({} bytes, limit {})",
                payload.len(),
                self.max_payload_bytes
            )));
        }
        Ok(())
    }
}
