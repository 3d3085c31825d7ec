use jiff::Timestamp;
use mosaic_core::UserId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal status of a recorded generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Completed,
    Failed,
}

/// Persisted generation, never mutated after insert
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_image_url: Option<String>,
    /// Provider id that produced the output
    pub model: String,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
}

impl GenerationRecord {
    /// Start a record stamped with a fresh id and the current time
    pub fn new(user_id: UserId, prompt: impl Into<String>, model: impl Into<String>, status: RecordStatus) -> Self {
        Self {
            id: Uuid::now_v7(),
            user_id,
            prompt: prompt.into(),
            input_image_url: None,
            output_image_url: None,
            model: model.into(),
            status,
            error: None,
            metadata: serde_json::Value::Null,
            created_at: Timestamp::now(),
        }
    }
}
