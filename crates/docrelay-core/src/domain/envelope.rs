//! JobEnvelope - queue に載せる作業単位
//!
//! # ワイヤ形式
//! ```json
//! {"taskId": "task-01J...", "document": "<base64>"}
//! ```
//!
//! 作成後は不変です（フィールドは private、getter のみ）。

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::errors::CodecError;
use super::ids::TaskId;

/// TaskId + payload の“運搬用”データ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobEnvelope {
    task_id: TaskId,
    #[serde(rename = "document", with = "base64_bytes")]
    payload: Vec<u8>,
}

impl JobEnvelope {
    pub fn new(task_id: TaskId, payload: Vec<u8>) -> Self {
        Self { task_id, payload }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Serialize for the queue.
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserialize a queue item.
    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ulid::Ulid;

    #[test]
    fn wire_shape_uses_task_id_and_base64_document() {
        let id = TaskId::from(Ulid::new());
        let env = JobEnvelope::new(id, b"doc-A".to_vec());

        let v: serde_json::Value = serde_json::from_slice(&env.encode().unwrap()).unwrap();
        assert_eq!(v["taskId"], id.to_string());
        assert_eq!(v["document"], "ZG9jLUE=");
    }

    #[test]
    fn decodes_what_workers_receive() {
        let id = TaskId::from(Ulid::new());
        let raw = format!(r#"{{"taskId":"{id}","document":"ZG9jLUI="}}"#);

        let env = JobEnvelope::decode(raw.as_bytes()).unwrap();
        assert_eq!(env.task_id(), id);
        assert_eq!(env.payload(), b"doc-B");
    }

    #[test]
    fn invalid_base64_is_a_codec_error() {
        let id = TaskId::from(Ulid::new());
        let raw = format!(r#"{{"taskId":"{id}","document":"***"}}"#);
        assert!(matches!(
            JobEnvelope::decode(raw.as_bytes()),
            Err(CodecError::Json(_))
        ));
    }
}
