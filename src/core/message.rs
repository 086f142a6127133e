use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reaction attached to a stored message. A message holds at most
/// one reaction; a later reaction replaces the earlier one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
    pub reactor_id: String,
    pub reactor_name: String,
}

/// One chat message, with the sender profile captured at send time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub sender_id: String,
    pub sender_name: String,
    pub sender_avatar: Option<String>,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reaction: Option<Reaction>,
}

impl ChatMessage {
    pub fn new(
        sender_id: String,
        sender_name: String,
        sender_avatar: Option<String>,
        content: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            sender_id,
            sender_name,
            sender_avatar,
            content,
            timestamp: Utc::now(),
            reaction: None,
        }
    }
}
