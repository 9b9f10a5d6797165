use std::time::Duration;

use async_trait::async_trait;
use docrelay_core::{DocumentProcessor, TaskId, TaskOutcome};
use serde_json::json;

const PREVIEW_CHARS: usize = 60;

/// Stand-in for the OCR engine: reports size, line count and a text preview.
pub struct DemoProcessor {
    pub delay: Duration,
}

#[async_trait]
impl DocumentProcessor for DemoProcessor {
    async fn process(&self, task_id: TaskId, document: &[u8]) -> TaskOutcome {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let Ok(text) = std::str::from_utf8(document) else {
            return TaskOutcome::error("cannot identify document format")
                .with_details(json!({"bytes": document.len()}));
        };

        let preview: String = text.chars().take(PREVIEW_CHARS).collect();
        tracing::debug!(task_id = %task_id, bytes = document.len(), "demo processed");
        TaskOutcome::ok(json!({
            "bytes": document.len(),
            "lines": text.lines().count(),
            "preview": preview.trim_end(),
        }))
    }
}
