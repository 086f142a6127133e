//! Core coordination facade for matchmaking and session state
//!
//! Every shared structure (registry, queue, room index, spam table,
//! ban list, event buffer) lives behind one lock, so each logical
//! operation spanning several of them runs as a single critical
//! section and partial states are never observable. Nothing here
//! performs network I/O while holding the lock: outbound frames go
//! through per-connection channels, which never block.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use warp::ws::Message;

use crate::config::ServerConfig;
use crate::constants::{
    DEFAULT_FILTERED_WORDS, EVENT_LOG_CAPACITY, ROOM_HISTORY_LIMIT, SPAM_MAX_MESSAGES,
    SPAM_WINDOW_SECS,
};
use crate::core::connection::ConnectionStatus;
use crate::core::events::{ChatEvent, EventLog};
use crate::core::matchmaker;
use crate::core::message::{ChatMessage, Reaction};
use crate::core::moderation::{BanList, SpamGuard, WordFilter};
use crate::core::protocol::{ConnectionSummary, RoomSummary, ServerStats};
use crate::core::queue::{QueueEntry, WaitingQueue};
use crate::core::registry::ConnectionRegistry;
use crate::core::room::{Participant, RoomDirectory};
use crate::error::{PairlinkError, Result};

/// Mutable core state, guarded by the hub's single lock
struct HubState {
    registry: ConnectionRegistry,
    queue: WaitingQueue,
    rooms: RoomDirectory,
    spam: SpamGuard,
    bans: BanList,
    events: EventLog,
}

/// Outcome of a transport-level connect attempt
pub enum ConnectOutcome {
    /// Connection admitted and registered under this id
    Accepted { connection_id: String },
    /// The remote address is banned; the caller must notify and close
    Banned,
}

/// A successful pairing, in queue arrival order
pub struct MatchedPair {
    pub room_id: String,
    pub first: Participant,
    pub second: Participant,
}

/// Result of a find-chat request
pub struct FindChatOutcome {
    /// False when the request was a no-op (already queued or chatting)
    pub queued: bool,
    pub matched: Option<MatchedPair>,
}

/// Routing data for a typing signal
pub struct TypingRelay {
    pub username: String,
    pub partner_id: String,
}

/// Result of a room teardown
#[derive(Debug, Clone)]
pub struct RoomClosed {
    pub room_id: String,
    pub ended_by: String,
    pub message: String,
    /// Still-registered participants to be told the chat ended
    pub recipients: Vec<String>,
}

/// What the disconnect path cleaned up
pub struct DisconnectSummary {
    pub username: Option<String>,
    pub closed_room: Option<RoomClosed>,
}

/// Result of an admin force-disconnect
pub struct ForceDisconnectOutcome {
    pub username: String,
    pub closed_room: Option<RoomClosed>,
}

/// One connection severed by an address ban
pub struct BanTarget {
    pub connection_id: String,
    pub closed_room: Option<RoomClosed>,
}

/// Coordination facade over all matchmaking and session state
pub struct ChatHub {
    state: RwLock<HubState>,
    filter: WordFilter,
    started_at: Instant,
}

/// Shared reference to the hub
pub type SharedHub = Arc<ChatHub>;

impl ChatHub {
    /// Hub with default moderation settings
    pub fn new() -> Self {
        Self::build(
            WordFilter::new(DEFAULT_FILTERED_WORDS.iter().map(|w| w.to_string()).collect()),
            SpamGuard::new(Duration::from_secs(SPAM_WINDOW_SECS), SPAM_MAX_MESSAGES),
            ROOM_HISTORY_LIMIT,
        )
    }

    /// Hub configured from server settings
    pub fn with_config(config: &ServerConfig) -> Self {
        Self::build(
            WordFilter::new(config.filtered_words.clone()),
            SpamGuard::new(config.spam_window, config.spam_max_messages),
            config.room_history_limit,
        )
    }

    fn build(filter: WordFilter, spam: SpamGuard, history_limit: usize) -> Self {
        Self {
            state: RwLock::new(HubState {
                registry: ConnectionRegistry::new(),
                queue: WaitingQueue::new(),
                rooms: RoomDirectory::new(history_limit),
                spam,
                bans: BanList::new(),
                events: EventLog::new(EVENT_LOG_CAPACITY),
            }),
            filter,
            started_at: Instant::now(),
        }
    }

    /// Admit or refuse a new transport connection. A banned address is
    /// refused before any state is recorded for it.
    pub async fn connect(
        &self,
        addr: IpAddr,
        sender: mpsc::UnboundedSender<Message>,
    ) -> ConnectOutcome {
        let mut state = self.state.write().await;

        if state.bans.contains(&addr) {
            warn!("Banned address {} attempted to connect", addr);
            return ConnectOutcome::Banned;
        }

        let connection_id = Uuid::new_v4().to_string();
        state.registry.register(connection_id.clone(), addr, sender);
        state.events.record(
            "user_connected",
            json!({ "connection_id": connection_id, "ip": addr.to_string() }),
        );
        info!("New connection {} from {}", connection_id, addr);

        ConnectOutcome::Accepted { connection_id }
    }

    /// Attach a display profile to a connection
    pub async fn register_profile(
        &self,
        connection_id: &str,
        username: String,
        avatar: Option<String>,
    ) -> Result<()> {
        let mut state = self.state.write().await;

        if !state
            .registry
            .update_profile(connection_id, username.clone(), avatar)
        {
            return Err(PairlinkError::ConnectionNotFound(connection_id.to_string()));
        }
        state.events.record(
            "user_registered",
            json!({ "connection_id": connection_id, "username": username }),
        );
        Ok(())
    }

    /// Enqueue a connection and immediately attempt a pairing.
    ///
    /// Requests from an address banned after admission are refused.
    /// Requests from a connection that is already queued or already in
    /// a room are no-ops. Enqueue and match run in one critical
    /// section, so two concurrent requests can never both observe a
    /// half-built pairing.
    pub async fn find_chat(
        &self,
        connection_id: &str,
        username: String,
        avatar: Option<String>,
    ) -> Result<FindChatOutcome> {
        let mut state = self.state.write().await;

        let (status, addr) = match state.registry.get(connection_id) {
            Some(conn) => (conn.status, conn.addr),
            None => return Err(PairlinkError::ConnectionNotFound(connection_id.to_string())),
        };
        // Bans are re-checked after admission, so a severed connection
        // that ignores the close cannot slip back into the queue
        if state.bans.contains(&addr) {
            warn!("Banned connection {} refused matchmaking", connection_id);
            return Err(PairlinkError::Banned);
        }
        if status != ConnectionStatus::Connected {
            return Ok(FindChatOutcome {
                queued: false,
                matched: None,
            });
        }

        // The queue entry carries the requested display data; keep the
        // registry profile in step so message snapshots agree with it.
        state
            .registry
            .update_profile(connection_id, username.clone(), avatar.clone());

        if !state
            .queue
            .enqueue(QueueEntry::new(connection_id.to_string(), username, avatar))
        {
            return Ok(FindChatOutcome {
                queued: false,
                matched: None,
            });
        }
        state
            .registry
            .set_status(connection_id, ConnectionStatus::Queued);

        let matched = match matchmaker::try_match(&mut state.queue) {
            Some((first, second)) => {
                let room_id = state.rooms.create(&first, &second);
                state
                    .registry
                    .set_room(&first.connection_id, Some(room_id.clone()));
                state
                    .registry
                    .set_room(&second.connection_id, Some(room_id.clone()));
                state.events.record(
                    "match_created",
                    json!({ "room_id": room_id, "users": [&first.username, &second.username] }),
                );
                info!(
                    "Matched {} and {} in room {}",
                    first.connection_id, second.connection_id, room_id
                );
                Some(MatchedPair {
                    room_id,
                    first: Participant::from(&first),
                    second: Participant::from(&second),
                })
            }
            None => None,
        };

        Ok(FindChatOutcome {
            queued: true,
            matched,
        })
    }

    /// Remove a connection from the waiting queue; false if it was not
    /// waiting
    pub async fn cancel_search(&self, connection_id: &str) -> bool {
        let mut state = self.state.write().await;

        let removed = state.queue.remove(connection_id);
        if removed {
            state
                .registry
                .set_status(connection_id, ConnectionStatus::Connected);
        }
        removed
    }

    /// Validate, throttle, redact, and store a chat message
    pub async fn post_message(
        &self,
        connection_id: &str,
        room_id: &str,
        content: &str,
    ) -> Result<ChatMessage> {
        let mut state = self.state.write().await;

        let (current_room, name, avatar, addr) = match state.registry.get(connection_id) {
            Some(conn) => (
                conn.room_id.clone(),
                conn.display_name(),
                conn.avatar.clone(),
                conn.addr,
            ),
            None => return Err(PairlinkError::ConnectionNotFound(connection_id.to_string())),
        };
        if state.bans.contains(&addr) {
            return Err(PairlinkError::Banned);
        }
        if current_room.as_deref() != Some(room_id) {
            return Err(PairlinkError::Validation(
                "You are not in this chat room".to_string(),
            ));
        }

        // Registry and room index agree by construction; a miss here is a bug
        let is_member = state
            .rooms
            .get(room_id)
            .map(|room| room.has_participant(connection_id));
        debug_assert_eq!(is_member, Some(true));
        if is_member != Some(true) {
            return Err(PairlinkError::RoomNotFound);
        }

        // Membership checks come before the throttle so an invalid
        // request never consumes window budget; a rejected send is not
        // recorded either.
        if !state.spam.check(connection_id) {
            state
                .events
                .record("spam_detected", json!({ "connection_id": connection_id }));
            return Err(PairlinkError::RateLimited);
        }

        let content = self.filter.redact(content);
        state
            .rooms
            .post_message(room_id, connection_id, name, avatar, content)
    }

    /// Routing data for a typing signal; the signal itself is not stored
    pub async fn relay_typing(&self, connection_id: &str, room_id: &str) -> Result<TypingRelay> {
        let state = self.state.read().await;

        let conn = state
            .registry
            .get(connection_id)
            .ok_or_else(|| PairlinkError::ConnectionNotFound(connection_id.to_string()))?;
        if conn.room_id.as_deref() != Some(room_id) {
            return Err(PairlinkError::Validation(
                "You are not in this chat room".to_string(),
            ));
        }

        match state
            .rooms
            .get(room_id)
            .and_then(|room| room.partner_of(connection_id))
        {
            Some(partner) => Ok(TypingRelay {
                username: conn.display_name(),
                partner_id: partner.connection_id.clone(),
            }),
            None => Err(PairlinkError::RoomNotFound),
        }
    }

    /// Attach a reaction to a retained message
    pub async fn add_reaction(
        &self,
        connection_id: &str,
        room_id: &str,
        message_id: Uuid,
        emoji: String,
    ) -> Result<Reaction> {
        let mut state = self.state.write().await;

        let (current_room, name) = match state.registry.get(connection_id) {
            Some(conn) => (conn.room_id.clone(), conn.display_name()),
            None => return Err(PairlinkError::ConnectionNotFound(connection_id.to_string())),
        };
        if current_room.as_deref() != Some(room_id) {
            return Err(PairlinkError::Validation(
                "You are not in this chat room".to_string(),
            ));
        }

        state
            .rooms
            .add_reaction(room_id, message_id, connection_id, name, emoji)
    }

    /// Tear down a room at a participant's request
    pub async fn end_chat(&self, connection_id: &str, room_id: &str) -> Result<RoomClosed> {
        let mut state = self.state.write().await;

        let (current_room, name) = match state.registry.get(connection_id) {
            Some(conn) => (conn.room_id.clone(), conn.display_name()),
            None => return Err(PairlinkError::ConnectionNotFound(connection_id.to_string())),
        };
        if current_room.as_deref() != Some(room_id) {
            return Err(PairlinkError::Validation(
                "You are not in this chat room".to_string(),
            ));
        }

        match self.close_room_locked(
            &mut state,
            room_id,
            connection_id,
            format!("{} left the chat", name),
        ) {
            Some(closed) => Ok(closed),
            None => Err(PairlinkError::RoomNotFound),
        }
    }

    /// Transport-disconnect cleanup. The registry removal is the
    /// exactly-once latch: a second call returns None and does nothing.
    pub async fn disconnect(&self, connection_id: &str) -> Option<DisconnectSummary> {
        let mut state = self.state.write().await;

        let connection = state.registry.remove(connection_id)?;
        state.queue.remove(connection_id);
        state.spam.forget(connection_id);

        let closed_room = match connection.room_id.as_deref() {
            Some(room_id) => self.close_room_locked(
                &mut state,
                room_id,
                connection_id,
                format!("{} disconnected", connection.display_name()),
            ),
            None => None,
        };

        state.events.record(
            "user_disconnected",
            json!({ "connection_id": connection_id, "username": connection.username }),
        );
        info!("Disconnected: {}", connection_id);

        Some(DisconnectSummary {
            username: connection.username.clone(),
            closed_room,
        })
    }

    /// Admin: clear a connection's session state ahead of severing it.
    /// The registry entry survives until the transport close runs the
    /// regular disconnect path.
    pub async fn force_disconnect(&self, connection_id: &str) -> Option<ForceDisconnectOutcome> {
        let mut state = self.state.write().await;

        let (username, room_id) = match state.registry.get(connection_id) {
            Some(conn) => (conn.display_name(), conn.room_id.clone()),
            None => return None,
        };

        if state.queue.remove(connection_id) {
            state
                .registry
                .set_status(connection_id, ConnectionStatus::Connected);
        }
        let closed_room = room_id.as_deref().and_then(|rid| {
            self.close_room_locked(&mut state, rid, "admin", "Chat ended by admin".to_string())
        });

        state.events.record(
            "admin_disconnect",
            json!({ "connection_id": connection_id, "username": username }),
        );

        Some(ForceDisconnectOutcome {
            username,
            closed_room,
        })
    }

    /// Admin: ban an address and sever every live connection using it.
    /// Returns the severed connections so the caller can notify them.
    pub async fn ban_address(&self, addr: IpAddr) -> Vec<BanTarget> {
        let mut state = self.state.write().await;

        state.bans.insert(addr);

        let ids = state.registry.ids_from_addr(&addr);
        let mut targets = Vec::with_capacity(ids.len());
        for connection_id in ids {
            if state.queue.remove(&connection_id) {
                state
                    .registry
                    .set_status(&connection_id, ConnectionStatus::Connected);
            }
            let (username, room_id) = match state.registry.get(&connection_id) {
                Some(conn) => (conn.display_name(), conn.room_id.clone()),
                None => continue,
            };
            let closed_room = room_id.as_deref().and_then(|rid| {
                self.close_room_locked(
                    &mut state,
                    rid,
                    &connection_id,
                    format!("{} disconnected", username),
                )
            });
            targets.push(BanTarget {
                connection_id,
                closed_room,
            });
        }

        state.events.record(
            "admin_ban",
            json!({ "ip": addr.to_string(), "affected_connections": targets.len() }),
        );
        warn!("Banned address {} ({} connections)", addr, targets.len());

        targets
    }

    /// Admin: lift an address ban; false if the address was not banned
    pub async fn unban_address(&self, addr: IpAddr) -> bool {
        let mut state = self.state.write().await;

        let removed = state.bans.remove(&addr);
        if removed {
            state
                .events
                .record("admin_unban", json!({ "ip": addr.to_string() }));
            info!("Unbanned address {}", addr);
        }
        removed
    }

    pub async fn banned_addresses(&self) -> Vec<IpAddr> {
        self.state.read().await.bans.addresses()
    }

    /// Aggregate counters for the admin surface
    pub async fn stats(&self) -> ServerStats {
        let state = self.state.read().await;

        let active_rooms = state.rooms.len();
        let total_duration: i64 = state.rooms.iter().map(|r| r.age_seconds()).sum();
        let avg_room_duration_seconds = if active_rooms > 0 {
            total_duration / active_rooms as i64
        } else {
            0
        };

        ServerStats {
            active_connections: state.registry.count(),
            active_rooms,
            queue_depth: state.queue.len(),
            total_messages: state.rooms.total_messages(),
            avg_room_duration_seconds,
            banned_addresses: state.bans.len(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            timestamp: Utc::now(),
        }
    }

    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        let state = self.state.read().await;
        state
            .rooms
            .iter()
            .map(|room| RoomSummary {
                room_id: room.id.clone(),
                participants: room.participants.to_vec(),
                message_count: room.message_count(),
                created_at: room.created_at,
                duration_seconds: room.age_seconds(),
            })
            .collect()
    }

    pub async fn list_connections(&self) -> Vec<ConnectionSummary> {
        let state = self.state.read().await;
        state
            .registry
            .iter()
            .map(|conn| ConnectionSummary {
                connection_id: conn.id.clone(),
                username: conn.display_name(),
                ip: conn.addr.to_string(),
                status: conn.status,
                room_id: conn.room_id.clone(),
                connected_at: conn.connected_at,
                duration_seconds: conn.duration_seconds(),
            })
            .collect()
    }

    /// Most recent lifecycle events, oldest first
    pub async fn recent_events(&self, limit: usize) -> Vec<ChatEvent> {
        self.state.read().await.events.recent(limit)
    }

    /// Send a serialized event to one connection
    pub async fn send_to_connection(&self, connection_id: &str, payload: &str) -> bool {
        let state = self.state.read().await;
        match state.registry.get(connection_id) {
            Some(conn) => conn.send_text(payload),
            None => false,
        }
    }

    /// Send a serialized event to every member of a room, except an
    /// optional excluded connection. Returns the delivered count.
    pub async fn send_to_room(&self, room_id: &str, payload: &str, exclude: Option<&str>) -> usize {
        let state = self.state.read().await;
        let room = match state.rooms.get(room_id) {
            Some(room) => room,
            None => return 0,
        };

        let mut delivered = 0;
        for participant in room.participants.iter() {
            if exclude == Some(participant.connection_id.as_str()) {
                continue;
            }
            if let Some(conn) = state.registry.get(&participant.connection_id) {
                if conn.send_text(payload) {
                    delivered += 1;
                }
            }
        }
        delivered
    }

    /// Ask a connection's transport to close
    pub async fn close_connection(&self, connection_id: &str) -> bool {
        let state = self.state.read().await;
        match state.registry.get(connection_id) {
            Some(conn) => conn.send_close(),
            None => false,
        }
    }

    /// Remove a room, clear both participants' room fields, and log.
    /// Returns None when the room is already gone, which keeps every
    /// teardown caller idempotent.
    fn close_room_locked(
        &self,
        state: &mut HubState,
        room_id: &str,
        ended_by: &str,
        message: String,
    ) -> Option<RoomClosed> {
        let room = state.rooms.remove(room_id)?;

        let mut recipients = Vec::new();
        for participant in room.participants.iter() {
            state.registry.set_room(&participant.connection_id, None);
            // Departed participants have no registry entry to notify
            if state.registry.get(&participant.connection_id).is_some() {
                recipients.push(participant.connection_id.clone());
            }
        }

        state
            .events
            .record("chat_ended", json!({ "room_id": room_id }));
        info!("Room {} closed by {}", room_id, ended_by);

        Some(RoomClosed {
            room_id: room_id.to_string(),
            ended_by: ended_by.to_string(),
            message,
            recipients,
        })
    }
}
