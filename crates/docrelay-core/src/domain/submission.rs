//! Submission - 成功時に caller へ返す値

use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Successful result of `submit` (`{taskId, result}` on the wire).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub task_id: TaskId,
    pub result: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn serializes_like_the_upload_response() {
        let task_id = TaskId::from(Ulid::new());
        let s = Submission {
            task_id,
            result: serde_json::json!({"page": 1}),
        };
        assert_eq!(
            serde_json::to_value(&s).unwrap(),
            serde_json::json!({"taskId": task_id.to_string(), "result": {"page": 1}})
        );
    }
}
