//! Core matchmaking and session functionality

pub mod connection;
pub mod events;
pub mod hub;
pub mod matchmaker;
pub mod message;
pub mod moderation;
pub mod protocol;
pub mod queue;
pub mod registry;
pub mod room;

// Re-export main components for convenience
pub use connection::{Connection, ConnectionStatus};
pub use hub::{ChatHub, SharedHub};
pub use message::{ChatMessage, Reaction};
pub use protocol::{ClientEvent, ServerEvent};
pub use queue::{QueueEntry, WaitingQueue};
pub use room::{Participant, Room, RoomDirectory};
