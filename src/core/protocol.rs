//! Wire types for the client event protocol and the admin views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::connection::ConnectionStatus;
use crate::core::message::ChatMessage;
use crate::core::room::Participant;

/// Client-to-server events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    /// Attach a display profile to the connection
    #[serde(rename = "register")]
    Register {
        username: String,
        #[serde(default)]
        avatar: Option<String>,
    },
    /// Join the waiting queue under the given profile
    #[serde(rename = "find_chat")]
    FindChat {
        username: String,
        #[serde(default)]
        avatar: Option<String>,
    },
    /// Leave the waiting queue
    #[serde(rename = "cancel_search")]
    CancelSearch,
    /// Send a chat message to the current room
    #[serde(rename = "send_message")]
    SendMessage { room_id: String, message: String },
    /// Signal typing state to the partner
    #[serde(rename = "typing")]
    Typing { room_id: String, is_typing: bool },
    /// React to a retained message in the current room
    #[serde(rename = "add_reaction")]
    AddReaction {
        room_id: String,
        message_id: Uuid,
        emoji: String,
    },
    /// Terminate the current room
    #[serde(rename = "end_chat")]
    EndChat { room_id: String },
}

/// Partner profile disclosed in a `matched` notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerProfile {
    pub username: String,
    #[serde(default)]
    pub avatar: Option<String>,
}

/// Server-to-client notifications
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "registered")]
    Registered { connection_id: String },
    #[serde(rename = "searching")]
    Searching { message: String },
    #[serde(rename = "search_cancelled")]
    SearchCancelled,
    #[serde(rename = "matched")]
    Matched {
        room_id: String,
        partner: PartnerProfile,
    },
    #[serde(rename = "new_message")]
    NewMessage {
        room_id: String,
        message: ChatMessage,
    },
    #[serde(rename = "user_typing")]
    UserTyping {
        room_id: String,
        username: String,
        is_typing: bool,
    },
    #[serde(rename = "reaction_added")]
    ReactionAdded {
        room_id: String,
        message_id: Uuid,
        emoji: String,
        reactor_id: String,
        reactor_name: String,
    },
    #[serde(rename = "chat_ended")]
    ChatEnded {
        room_id: String,
        message: String,
        ended_by: String,
    },
    #[serde(rename = "error")]
    Error { code: String, message: String },
    #[serde(rename = "banned")]
    Banned { message: String },
    #[serde(rename = "force_disconnect")]
    ForceDisconnect { message: String },
}

impl ServerEvent {
    /// Serialize for the wire; serialization of these types cannot fail
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Connection details for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionSummary {
    pub connection_id: String,
    pub username: String,
    pub ip: String,
    pub status: ConnectionStatus,
    pub room_id: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// Room details for admin listings
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: String,
    pub participants: Vec<Participant>,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

/// Aggregate counters for the admin stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ServerStats {
    pub active_connections: usize,
    pub active_rooms: usize,
    pub queue_depth: usize,
    pub total_messages: usize,
    pub avg_room_duration_seconds: i64,
    pub banned_addresses: usize,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}
