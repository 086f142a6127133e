use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core::message::{ChatMessage, Reaction};
use crate::core::queue::QueueEntry;
use crate::error::{PairlinkError, Result};

/// Public profile of one room participant
#[derive(Debug, Clone, Serialize)]
pub struct Participant {
    pub connection_id: String,
    pub username: String,
    pub avatar: Option<String>,
}

impl From<&QueueEntry> for Participant {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            connection_id: entry.connection_id.clone(),
            username: entry.username.clone(),
            avatar: entry.avatar.clone(),
        }
    }
}

/// A two-party chat session
pub struct Room {
    /// Unique identifier for the room
    pub id: String,
    /// Exactly two participants, in queue arrival order
    pub participants: [Participant; 2],
    /// Retained messages, oldest first; bounded by the history limit
    messages: VecDeque<ChatMessage>,
    history_limit: usize,
    /// Timestamp of room creation
    pub created_at: DateTime<Utc>,
}

impl Room {
    /// Builds a room from the two queue entries selected by the matchmaker
    pub fn new(first: &QueueEntry, second: &QueueEntry, history_limit: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            participants: [Participant::from(first), Participant::from(second)],
            messages: VecDeque::new(),
            history_limit,
            created_at: Utc::now(),
        }
    }

    /// Checks whether a connection participates in this room
    pub fn has_participant(&self, connection_id: &str) -> bool {
        self.participants
            .iter()
            .any(|p| p.connection_id == connection_id)
    }

    /// The other participant, if `connection_id` is one of the two
    pub fn partner_of(&self, connection_id: &str) -> Option<&Participant> {
        match self
            .participants
            .iter()
            .position(|p| p.connection_id == connection_id)
        {
            Some(idx) => self.participants.get(1 - idx),
            None => None,
        }
    }

    /// Append a message, evicting the oldest one beyond the history limit
    pub fn push_message(&mut self, message: ChatMessage) {
        if self.messages.len() >= self.history_limit {
            self.messages.pop_front();
        }
        self.messages.push_back(message);
    }

    /// Attach a reaction to a retained message. Overwrites any previous
    /// reaction: last write wins.
    pub fn react(&mut self, message_id: Uuid, reaction: Reaction) -> Result<()> {
        match self.messages.iter_mut().find(|m| m.id == message_id) {
            Some(message) => {
                message.reaction = Some(reaction);
                Ok(())
            }
            None => Err(PairlinkError::MessageNotFound),
        }
    }

    /// Returns the number of retained messages
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Retained messages, oldest first
    pub fn messages(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// Seconds since the room was created
    pub fn age_seconds(&self) -> i64 {
        (Utc::now() - self.created_at).num_seconds()
    }
}

/// Index of all active rooms in the server
pub struct RoomDirectory {
    /// Map of room ID to room instance
    rooms: HashMap<String, Room>,
    history_limit: usize,
}

impl RoomDirectory {
    pub fn new(history_limit: usize) -> Self {
        Self {
            rooms: HashMap::new(),
            history_limit,
        }
    }

    /// Creates and indexes a room for a matched pair; returns its ID
    pub fn create(&mut self, first: &QueueEntry, second: &QueueEntry) -> String {
        let room = Room::new(first, second, self.history_limit);
        let room_id = room.id.clone();
        self.rooms.insert(room_id.clone(), room);
        room_id
    }

    pub fn get(&self, room_id: &str) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Removes a room from the index. Idempotent: a second removal
    /// returns None.
    pub fn remove(&mut self, room_id: &str) -> Option<Room> {
        self.rooms.remove(room_id)
    }

    /// Validates sender membership and appends a message. The content
    /// must already have passed moderation.
    pub fn post_message(
        &mut self,
        room_id: &str,
        sender_id: &str,
        sender_name: String,
        sender_avatar: Option<String>,
        content: String,
    ) -> Result<ChatMessage> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or(PairlinkError::RoomNotFound)?;
        if !room.has_participant(sender_id) {
            return Err(PairlinkError::Validation(
                "You are not in this chat room".to_string(),
            ));
        }

        let message = ChatMessage::new(sender_id.to_string(), sender_name, sender_avatar, content);
        room.push_message(message.clone());
        Ok(message)
    }

    /// Attaches a reaction on behalf of a room participant
    pub fn add_reaction(
        &mut self,
        room_id: &str,
        message_id: Uuid,
        reactor_id: &str,
        reactor_name: String,
        emoji: String,
    ) -> Result<Reaction> {
        let room = self
            .rooms
            .get_mut(room_id)
            .ok_or(PairlinkError::RoomNotFound)?;
        if !room.has_participant(reactor_id) {
            return Err(PairlinkError::Validation(
                "You are not in this chat room".to_string(),
            ));
        }

        let reaction = Reaction {
            emoji,
            reactor_id: reactor_id.to_string(),
            reactor_name,
        };
        room.react(message_id, reaction.clone())?;
        Ok(reaction)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    /// Messages currently retained across all active rooms
    pub fn total_messages(&self) -> usize {
        self.rooms.values().map(|r| r.message_count()).sum()
    }
}
