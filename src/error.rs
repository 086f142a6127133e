use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum PairlinkError {
    // Request validation errors
    Validation(String),
    RateLimited,

    // Lookup errors
    ConnectionNotFound(String),
    RoomNotFound,
    MessageNotFound,

    // Policy errors
    Banned,

    // Protocol errors
    EventParse(String),
    EventTooLarge(usize),

    // Configuration errors
    Config(String),
}

impl PairlinkError {
    /// Stable machine-readable code reported to clients in error events
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REQUEST",
            Self::RateLimited => "RATE_LIMITED",
            Self::ConnectionNotFound(_) => "CONNECTION_NOT_FOUND",
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::MessageNotFound => "MESSAGE_NOT_FOUND",
            Self::Banned => "BANNED",
            Self::EventParse(_) => "INVALID_EVENT",
            Self::EventTooLarge(_) => "EVENT_TOO_LARGE",
            Self::Config(_) => "CONFIG_ERROR",
        }
    }
}

impl fmt::Display for PairlinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation(msg) => write!(f, "{}", msg),
            Self::RateLimited => write!(f, "You are sending messages too quickly!"),
            Self::ConnectionNotFound(id) => write!(f, "Connection not found: {}", id),
            Self::RoomNotFound => write!(f, "Chat room not found"),
            Self::MessageNotFound => write!(f, "Message not found"),
            Self::Banned => write!(f, "You have been banned from this server"),
            Self::EventParse(msg) => write!(f, "Invalid event: {}", msg),
            Self::EventTooLarge(size) => write!(f, "Event too large: {} bytes", size),
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl Error for PairlinkError {}

// Generic result type for pairlink
pub type Result<T> = std::result::Result<T, PairlinkError>;
