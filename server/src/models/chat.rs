use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::Record;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender_id: String,
    pub receiver_id: String,
    pub room_id: String,
    pub body: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for ChatMessage {
    const COLLECTION: &'static str = "messages";
}

impl ChatMessage {
    pub fn new(sender_id: &str, receiver_id: &str, body: impl Into<String>) -> Self {
        Self {
            id: None,
            sender_id: sender_id.to_string(),
            receiver_id: receiver_id.to_string(),
            room_id: room_id(sender_id, receiver_id),
            body: body.into(),
            read: false,
            created_at: None,
            updated_at: None,
        }
    }
}

/// Both directions of a conversation map to the same room.
pub fn room_id(a: &str, b: &str) -> String {
    if a <= b {
        format!("{a}_{b}")
    } else {
        format!("{b}_{a}")
    }
}
