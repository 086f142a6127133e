//! Connection registry: owns the state of every live connection

use std::collections::HashMap;
use std::net::IpAddr;
use tokio::sync::mpsc;
use warp::ws::Message;

use crate::core::connection::{Connection, ConnectionStatus};

/// All live connections, keyed by connection id
pub struct ConnectionRegistry {
    connections: HashMap<String, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: HashMap::new(),
        }
    }

    /// Insert a freshly connected client
    pub fn register(&mut self, id: String, addr: IpAddr, sender: mpsc::UnboundedSender<Message>) {
        let connection = Connection::new(id.clone(), addr, sender);
        self.connections.insert(id, connection);
    }

    pub fn get(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Attach or replace the display profile
    pub fn update_profile(&mut self, id: &str, username: String, avatar: Option<String>) -> bool {
        match self.connections.get_mut(id) {
            Some(conn) => {
                conn.username = Some(username);
                conn.avatar = avatar;
                true
            }
            None => false,
        }
    }

    /// Point a connection at a room (or clear it), keeping the status
    /// field in step
    pub fn set_room(&mut self, id: &str, room_id: Option<String>) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.status = if room_id.is_some() {
                ConnectionStatus::InRoom
            } else {
                ConnectionStatus::Connected
            };
            conn.room_id = room_id;
        }
    }

    pub fn set_status(&mut self, id: &str, status: ConnectionStatus) {
        if let Some(conn) = self.connections.get_mut(id) {
            conn.status = status;
        }
    }

    /// Remove a connection. Returns the entry only on the first call,
    /// which makes it the exactly-once latch for disconnect cleanup.
    pub fn remove(&mut self, id: &str) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }

    /// Ids of all live connections from the given address
    pub fn ids_from_addr(&self, addr: &IpAddr) -> Vec<String> {
        self.connections
            .values()
            .filter(|c| c.addr == *addr)
            .map(|c| c.id.clone())
            .collect()
    }
}
