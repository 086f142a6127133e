//! Per-connection event dispatch
//!
//! Translates inbound client events into hub operations and fans the
//! resulting notifications back out to the affected connections. Every
//! failure is reported to the sender as an error event; only a banned
//! address costs the sender its connection.

use log::{debug, warn};
use uuid::Uuid;

use crate::constants::{MAX_MESSAGE_LENGTH, MAX_USERNAME_LENGTH};
use crate::core::hub::SharedHub;
use crate::core::protocol::{ClientEvent, PartnerProfile, ServerEvent};
use crate::error::{PairlinkError, Result};

/// Upper bound on one inbound frame, enforced before JSON parsing
const MAX_EVENT_BYTES: usize = 4096;

/// Handles incoming client events and routes them appropriately
pub struct EventDispatcher {
    hub: SharedHub,
}

impl EventDispatcher {
    pub fn new(hub: SharedHub) -> Self {
        Self { hub }
    }

    /// Parse and dispatch one inbound text frame. Returns false when
    /// the sender turned out to be banned and its transport must go.
    pub async fn handle_text(&self, connection_id: &str, raw: &str) -> bool {
        if let Err(e) = self.dispatch(connection_id, raw).await {
            debug!("Rejected event from {}: {}", connection_id, e);
            self.send_error(connection_id, &e).await;
            return !matches!(e, PairlinkError::Banned);
        }
        true
    }

    async fn dispatch(&self, connection_id: &str, raw: &str) -> Result<()> {
        if raw.len() > MAX_EVENT_BYTES {
            return Err(PairlinkError::EventTooLarge(raw.len()));
        }

        let event: ClientEvent =
            serde_json::from_str(raw).map_err(|e| PairlinkError::EventParse(e.to_string()))?;

        match event {
            ClientEvent::Register { username, avatar } => {
                self.handle_register(connection_id, username, avatar).await
            }
            ClientEvent::FindChat { username, avatar } => {
                self.handle_find_chat(connection_id, username, avatar).await
            }
            ClientEvent::CancelSearch => self.handle_cancel_search(connection_id).await,
            ClientEvent::SendMessage { room_id, message } => {
                self.handle_send_message(connection_id, &room_id, &message)
                    .await
            }
            ClientEvent::Typing { room_id, is_typing } => {
                self.handle_typing(connection_id, &room_id, is_typing).await
            }
            ClientEvent::AddReaction {
                room_id,
                message_id,
                emoji,
            } => {
                self.handle_add_reaction(connection_id, &room_id, message_id, emoji)
                    .await
            }
            ClientEvent::EndChat { room_id } => self.handle_end_chat(connection_id, &room_id).await,
        }
    }

    /// Report an error to the originating connection only
    async fn send_error(&self, connection_id: &str, error: &PairlinkError) {
        let event = ServerEvent::Error {
            code: error.code().to_string(),
            message: error.to_string(),
        };
        if !self.hub.send_to_connection(connection_id, &event.to_json()).await {
            warn!("Failed to deliver error to connection {}", connection_id);
        }
    }

    fn validate_username(username: &str) -> Result<String> {
        let trimmed = username.trim();
        if trimmed.is_empty() {
            return Err(PairlinkError::Validation(
                "Username cannot be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_USERNAME_LENGTH {
            return Err(PairlinkError::Validation(format!(
                "Username too long. Maximum {} characters allowed",
                MAX_USERNAME_LENGTH
            )));
        }
        Ok(trimmed.to_string())
    }

    async fn handle_register(
        &self,
        connection_id: &str,
        username: String,
        avatar: Option<String>,
    ) -> Result<()> {
        let username = Self::validate_username(&username)?;
        self.hub
            .register_profile(connection_id, username, avatar)
            .await?;

        let event = ServerEvent::Registered {
            connection_id: connection_id.to_string(),
        };
        self.hub
            .send_to_connection(connection_id, &event.to_json())
            .await;
        Ok(())
    }

    async fn handle_find_chat(
        &self,
        connection_id: &str,
        username: String,
        avatar: Option<String>,
    ) -> Result<()> {
        let username = Self::validate_username(&username)?;
        let outcome = self.hub.find_chat(connection_id, username, avatar).await?;

        if outcome.queued {
            let searching = ServerEvent::Searching {
                message: "Searching for a chat partner...".to_string(),
            };
            self.hub
                .send_to_connection(connection_id, &searching.to_json())
                .await;
        }

        if let Some(pair) = outcome.matched {
            // Each side learns the partner's profile, never its own
            let to_first = ServerEvent::Matched {
                room_id: pair.room_id.clone(),
                partner: PartnerProfile {
                    username: pair.second.username.clone(),
                    avatar: pair.second.avatar.clone(),
                },
            };
            let to_second = ServerEvent::Matched {
                room_id: pair.room_id.clone(),
                partner: PartnerProfile {
                    username: pair.first.username.clone(),
                    avatar: pair.first.avatar.clone(),
                },
            };
            self.hub
                .send_to_connection(&pair.first.connection_id, &to_first.to_json())
                .await;
            self.hub
                .send_to_connection(&pair.second.connection_id, &to_second.to_json())
                .await;
        }
        Ok(())
    }

    async fn handle_cancel_search(&self, connection_id: &str) -> Result<()> {
        // Cancelling when not queued is still acknowledged, so clients
        // can treat the ack as the end of the searching state
        self.hub.cancel_search(connection_id).await;
        self.hub
            .send_to_connection(connection_id, &ServerEvent::SearchCancelled.to_json())
            .await;
        Ok(())
    }

    async fn handle_send_message(
        &self,
        connection_id: &str,
        room_id: &str,
        message: &str,
    ) -> Result<()> {
        if message.trim().is_empty() {
            return Err(PairlinkError::Validation(
                "Message cannot be empty".to_string(),
            ));
        }
        if message.len() > MAX_MESSAGE_LENGTH {
            return Err(PairlinkError::Validation(format!(
                "Message too long. Maximum {} characters allowed",
                MAX_MESSAGE_LENGTH
            )));
        }

        let stored = self.hub.post_message(connection_id, room_id, message).await?;
        let event = ServerEvent::NewMessage {
            room_id: room_id.to_string(),
            message: stored,
        };
        // Both members receive the stored message, sender included
        let delivered = self.hub.send_to_room(room_id, &event.to_json(), None).await;
        debug!("Delivered message to {} members of room {}", delivered, room_id);
        Ok(())
    }

    async fn handle_typing(
        &self,
        connection_id: &str,
        room_id: &str,
        is_typing: bool,
    ) -> Result<()> {
        let relay = self.hub.relay_typing(connection_id, room_id).await?;
        let event = ServerEvent::UserTyping {
            room_id: room_id.to_string(),
            username: relay.username,
            is_typing,
        };
        // Typing indicators go to the partner only
        self.hub
            .send_to_connection(&relay.partner_id, &event.to_json())
            .await;
        Ok(())
    }

    async fn handle_add_reaction(
        &self,
        connection_id: &str,
        room_id: &str,
        message_id: Uuid,
        emoji: String,
    ) -> Result<()> {
        // Length cap allows multi-codepoint emoji sequences
        if emoji.trim().is_empty() || emoji.len() > 32 {
            return Err(PairlinkError::Validation(
                "Invalid reaction emoji".to_string(),
            ));
        }

        let reaction = self
            .hub
            .add_reaction(connection_id, room_id, message_id, emoji)
            .await?;
        let event = ServerEvent::ReactionAdded {
            room_id: room_id.to_string(),
            message_id,
            emoji: reaction.emoji,
            reactor_id: reaction.reactor_id,
            reactor_name: reaction.reactor_name,
        };
        self.hub.send_to_room(room_id, &event.to_json(), None).await;
        Ok(())
    }

    async fn handle_end_chat(&self, connection_id: &str, room_id: &str) -> Result<()> {
        let closed = self.hub.end_chat(connection_id, room_id).await?;
        let event = ServerEvent::ChatEnded {
            room_id: closed.room_id.clone(),
            message: closed.message.clone(),
            ended_by: closed.ended_by.clone(),
        };
        let payload = event.to_json();
        for recipient in &closed.recipients {
            self.hub.send_to_connection(recipient, &payload).await;
        }
        Ok(())
    }
}
