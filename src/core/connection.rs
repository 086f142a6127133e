//! WebSocket connection state
//! Tracks one client from transport connect to disconnect

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use std::net::IpAddr;
use tokio::sync::mpsc;
use warp::ws::Message;

/// Lifecycle phase of a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// Connected, neither waiting nor chatting
    Connected,
    /// Waiting in the matchmaking queue
    Queued,
    /// Participating in an active room
    InRoom,
}

/// Represents the state of a single WebSocket connection
pub struct Connection {
    pub id: String,
    pub addr: IpAddr,
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub room_id: Option<String>,
    pub status: ConnectionStatus,
    pub connected_at: DateTime<Utc>,
    pub sender: mpsc::UnboundedSender<Message>,
}

impl Connection {
    /// Create a new unregistered connection
    pub fn new(id: String, addr: IpAddr, sender: mpsc::UnboundedSender<Message>) -> Self {
        Self {
            id,
            addr,
            username: None,
            avatar: None,
            room_id: None,
            status: ConnectionStatus::Connected,
            connected_at: Utc::now(),
            sender,
        }
    }

    /// Send a text frame through this connection
    pub fn send_text(&self, text: &str) -> bool {
        match self.sender.send(Message::text(text)) {
            Ok(_) => true,
            Err(_) => {
                warn!("Failed to send message to client {}", self.id);
                false
            }
        }
    }

    /// Ask the transport to close; delivery is best-effort
    pub fn send_close(&self) -> bool {
        self.sender.send(Message::close()).is_ok()
    }

    /// Display name, or the placeholder used before registration
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .unwrap_or_else(|| "Anonymous".to_string())
    }

    /// Seconds since the transport connected
    pub fn duration_seconds(&self) -> i64 {
        (Utc::now() - self.connected_at).num_seconds()
    }
}
