//! ResultNotification - worker が固定 topic に publish する完了通知
//!
//! # ワイヤ形式（canonical）
//! ```json
//! {"taskId": "task-...", "status": "ok", "data": {...}}
//! {"taskId": "task-...", "status": "error", "message": "...", "details": {...}}
//! ```
//!
//! # 寛容に受け付ける形式
//! ```json
//! {"taskId": "task-...", "result": {...}}
//! {"taskId": "task-...", "error": "...", "details": {...}}
//! ```
//! `result` が文字列の `error` フィールドを持つ object なら worker 失敗として扱います。
//!
//! # 古い worker の形
//! ```json
//! {"text": "...", "metadata": {...}, "task_metadata": {"task_id": "task-...", "processing_time": "..."}}
//! {"error": "...", "task_id": "task-..."}
//! ```
//! `taskId` が無いときは `task_id`、次に `task_metadata.task_id` を見ます。
//! `task_metadata` で id が見つかり `result` / `error` が無いときは、object 全体
//! （`task_metadata` を除く）を成功結果として扱います。
//!
//! routing は topic 名ではなく payload 内の `taskId` で行います。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::errors::CodecError;
use super::ids::TaskId;

/// What the worker reported for one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskOutcome {
    Ok {
        data: Value,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl TaskOutcome {
    pub fn ok(data: Value) -> Self {
        TaskOutcome::Ok { data }
    }

    pub fn error(message: impl Into<String>) -> Self {
        TaskOutcome::Error {
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(self, details: Value) -> Self {
        match self {
            TaskOutcome::Error { message, .. } => TaskOutcome::Error {
                message,
                details: Some(details),
            },
            ok => ok,
        }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, TaskOutcome::Ok { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultNotification {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub outcome: TaskOutcome,
}

impl ResultNotification {
    pub fn new(task_id: TaskId, outcome: TaskOutcome) -> Self {
        Self { task_id, outcome }
    }

    /// Serialize in the canonical form.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse a published message (canonical or lenient form).
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        let Some(obj) = value.as_object() else {
            return Err(CodecError::InvalidNotification("not a JSON object".into()));
        };

        let (raw_id, flat) = match raw_task_id(obj) {
            Some(found) => found,
            None => return Err(CodecError::InvalidNotification("missing taskId".into())),
        };
        let task_id: TaskId = raw_id
            .parse()
            .map_err(|e| CodecError::InvalidNotification(format!("{e}")))?;

        let outcome = if obj.contains_key("status") {
            serde_json::from_value::<TaskOutcome>(value.clone())?
        } else if let Some(error) = obj.get("error") {
            TaskOutcome::Error {
                message: error_message(error),
                details: obj.get("details").cloned(),
            }
        } else if let Some(result) = obj.get("result") {
            lenient_result(result)
        } else if flat {
            let mut data = obj.clone();
            data.remove("task_metadata");
            lenient_result(&Value::Object(data))
        } else {
            return Err(CodecError::InvalidNotification(format!(
                "no result or error for {task_id}"
            )));
        };

        Ok(Self { task_id, outcome })
    }
}

/// The id and whether it came from a flat `task_metadata` payload.
fn raw_task_id(obj: &Map<String, Value>) -> Option<(&str, bool)> {
    if let Some(id) = obj.get("taskId").and_then(Value::as_str) {
        return Some((id, false));
    }
    if let Some(id) = obj.get("task_id").and_then(Value::as_str) {
        return Some((id, false));
    }
    obj.get("task_metadata")
        .and_then(|m| m.get("task_id"))
        .and_then(Value::as_str)
        .map(|id| (id, true))
}

fn error_message(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(o) => o
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        other => other.to_string(),
    }
}

fn lenient_result(result: &Value) -> TaskOutcome {
    match result.get("error").and_then(Value::as_str) {
        Some(message) => TaskOutcome::Error {
            message: message.to_string(),
            details: Some(result.clone()),
        },
        None => TaskOutcome::Ok {
            data: result.clone(),
        },
    }
}
