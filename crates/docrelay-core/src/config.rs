//! Config - bridge と worker の設定
//!
//! 値は `Default` から始めて `with_*` で上書きします。CLI では clap が env / flag から組み立てます。

use std::time::Duration;

/// Queue the gateway enqueues onto.
pub const DEFAULT_QUEUE: &str = "ocr_queue";

/// Fixed topic every worker publishes results on.
pub const DEFAULT_RESULT_TOPIC: &str = "ocr_results";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub queue_name: String,
    pub result_topic: String,
    /// Ceiling for one submission, measured from registration.
    pub submit_timeout: Duration,
    pub max_payload_bytes: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE.to_string(),
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
            submit_timeout: Duration::from_secs(30),
            max_payload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl BridgeConfig {
    pub fn with_queue_name(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    pub fn with_result_topic(mut self, topic: impl Into<String>) -> Self {
        self.result_topic = topic.into();
        self
    }

    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    pub fn with_max_payload_bytes(mut self, max: usize) -> Self {
        self.max_payload_bytes = max;
        self
    }

    /// Reject settings that would make every submission fail.
    pub fn validate(&self) -> Result<(), String> {
        if self.queue_name.is_empty() {
            return Err("queue_name must not be empty".into());
        }
        if self.result_topic.is_empty() {
            return Err("result_topic must not be empty".into());
        }
        if self.submit_timeout.is_zero() {
            return Err("submit_timeout must be greater than zero".into());
        }
        if self.max_payload_bytes == 0 {
            return Err("max_payload_bytes must be greater than zero".into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    pub queue_name: String,
    pub result_topic: String,
    pub concurrency: usize,
    /// How long one dequeue call blocks before re-checking shutdown.
    pub dequeue_timeout: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queue_name: DEFAULT_QUEUE.to_string(),
            result_topic: DEFAULT_RESULT_TOPIC.to_string(),
            concurrency: 1,
            dequeue_timeout: Duration::from_secs(1),
        }
    }
}

impl WorkerConfig {
    /// Worker settings that talk to the same queue and topic as `bridge`.
    pub fn matching(bridge: &BridgeConfig) -> Self {
        Self {
            queue_name: bridge.queue_name.clone(),
            result_topic: bridge.result_topic.clone(),
            ..Self::default()
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_dequeue_timeout(mut self, timeout: Duration) -> Self {
        self.dequeue_timeout = timeout;
        self
    }
}
