//! Pairlink - an anonymous pair-chat WebSocket server
//!
//! This library provides the matchmaking queue, the pairing engine,
//! two-party room management, and the per-connection event protocol,
//! with moderation (spam throttling, word redaction, address bans)
//! applied along the message path.

pub mod config;
pub mod constants;
pub mod core;
pub mod error;
pub mod handlers;

// Re-export main components
pub use config::*;
pub use constants::*;
