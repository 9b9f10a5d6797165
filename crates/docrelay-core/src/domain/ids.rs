//! Correlation identifier (TaskId).
//!
//! # ULID ベースの ID
//! TaskId は submission ごとに 1 つ発行され、Job Envelope と Result Notification を
//! 結びつけます。
//!
//! ## ULID の特性
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **衝突耐性**: 80-bit のランダム部分があるため、同一ミリ秒内の並行生成でも重複しない
//! - **UUID互換**: 128-bit で UUID と同じサイズ
//!
//! ## ワイヤ上の表現
//! `task-<ULID>` という文字列としてシリアライズされます（worker 側は opaque な文字列として扱う）。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

const PREFIX: &str = "task-";

/// Identifier of one submission (correlates envelope and notification).
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(Ulid);

impl TaskId {
    /// ULID から TaskId を作成
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// 内部の ULID を取得
    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{PREFIX}{}", self.0)
    }
}

/// Error returned when a string is not a valid `task-<ULID>`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid task id: {0:?}")]
pub struct ParseTaskIdError(pub String);

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .strip_prefix(PREFIX)
            .ok_or_else(|| ParseTaskIdError(s.to_string()))?;
        Ulid::from_string(raw)
            .map(Self)
            .map_err(|_| ParseTaskIdError(s.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = ParseTaskIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(id: TaskId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_has_task_prefix() {
        let ulid = Ulid::new();
        let id = TaskId::from_ulid(ulid);
        assert_eq!(id.to_string(), format!("task-{ulid}"));
        assert_eq!(id.as_ulid(), ulid);
    }

    #[test]
    fn parses_its_own_display() {
        let id = TaskId::from(Ulid::new());
        let parsed: TaskId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn serializes_as_plain_string() {
        let id = TaskId::from(Ulid::new());
        let v = serde_json::to_value(id).unwrap();
        assert_eq!(v, serde_json::Value::String(id.to_string()));
    }

    #[test]
    fn rejects_timestamp_style_ids() {
        // timestamp だけの ID は受け付けない
        let err = "task-1700000000000".parse::<TaskId>().unwrap_err();
        assert_eq!(err, ParseTaskIdError("task-1700000000000".to_string()));

        assert!("01J0000000000000000000000".parse::<TaskId>().is_err());
        assert!(serde_json::from_str::<TaskId>("\"job-01J\"").is_err());
    }

    #[test]
    fn ids_are_sortable_by_creation_time() {
        let id1 = TaskId::from(Ulid::new());
        std::thread::sleep(std::time::Duration::from_millis(2));
        let id2 = TaskId::from(Ulid::new());
        assert!(id1 < id2);
    }
}
