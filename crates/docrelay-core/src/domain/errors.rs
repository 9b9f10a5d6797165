//! Errors - エラー型と分類
//!
//! # 分類
//! - **SubmitError**: caller に見えるエラー（Gateway だけが生成する）
//! - **RegistryError**: TaskRegistry の内部エラー
//! - **BrokerError**: queue / pub-sub substrate の障害
//! - **CodecError**: envelope / notification のデコード失敗
//!
//! 重複 notification は「エラー」としては表現しません。`resolve` が `false` を返すだけです。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::TaskId;

/// Caller-visible failure of a submission.
#[derive(Debug, Error)]
pub enum SubmitError {
    /// Malformed or missing input. Fails before anything is queued.
    #[error("{0}")]
    Validation(String),

    /// The queue substrate rejected the envelope.
    #[error("failed to enqueue task {task_id}: {source}")]
    Enqueue {
        task_id: TaskId,
        #[source]
        source: BrokerError,
    },

    /// No notification arrived before the deadline.
    #[error("no result for task {task_id} within {timeout_ms}ms")]
    Timeout { task_id: TaskId, timeout_ms: u64 },

    /// The worker reported a failure.
    #[error("worker failed task {task_id}: {message}")]
    Worker {
        task_id: TaskId,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// The service stopped while the submission was waiting.
    #[error("service is shutting down")]
    Shutdown,

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl SubmitError {
    /// Status code the transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            SubmitError::Validation(_) => 400,
            SubmitError::Enqueue { .. } => 503,
            SubmitError::Timeout { .. } => 504,
            SubmitError::Worker { .. } => 502,
            SubmitError::Shutdown => 503,
            SubmitError::Registry(_) => 500,
        }
    }

    /// Structured error body (`{success: false, message, details?}`).
    pub fn to_body(&self) -> ErrorBody {
        let details = match self {
            SubmitError::Worker { details, .. } => details.clone(),
            SubmitError::Enqueue { source, .. } => {
                Some(serde_json::Value::String(source.to_string()))
            }
            _ => None,
        };
        ErrorBody {
            success: false,
            message: self.to_string(),
            details,
        }
    }

    /// Is it safe to retry the whole submission?
    ///
    /// Every retry gets a fresh task id, so timeouts and substrate failures are retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SubmitError::Timeout { .. } | SubmitError::Enqueue { .. })
    }
}

/// Error body handed to the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("task {0} is already registered")]
    DuplicateTask(TaskId),

    /// The registry was closed by shutdown.
    #[error("task registry is closed")]
    Closed,
}

/// Failure of the queue / pub-sub substrate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("broker connection closed")]
    Closed,

    #[error("broker operation failed: {0}")]
    OperationFailed(String),
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid notification: {0}")]
    InvalidNotification(String),
}
