//! FIFO waiting queue for connections looking for a chat partner

use chrono::{DateTime, Utc};
use std::collections::{HashSet, VecDeque};

/// A connection's request to be matched, carrying the display profile
/// it asked to be presented under
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub connection_id: String,
    pub username: String,
    pub avatar: Option<String>,
    pub queued_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(connection_id: String, username: String, avatar: Option<String>) -> Self {
        Self {
            connection_id,
            username,
            avatar,
            queued_at: Utc::now(),
        }
    }
}

/// Strict arrival-order queue with at most one entry per connection.
/// The membership set makes the duplicate check O(1); the deque keeps
/// arrival order for the matcher.
pub struct WaitingQueue {
    entries: VecDeque<QueueEntry>,
    members: HashSet<String>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self {
            entries: VecDeque::new(),
            members: HashSet::new(),
        }
    }

    /// Append an entry. Returns false and leaves the queue untouched
    /// when the connection is already waiting.
    pub fn enqueue(&mut self, entry: QueueEntry) -> bool {
        if self.members.contains(&entry.connection_id) {
            return false;
        }
        self.members.insert(entry.connection_id.clone());
        self.entries.push_back(entry);
        true
    }

    /// Remove and return the longest-waiting entry
    pub fn pop_front(&mut self) -> Option<QueueEntry> {
        let entry = self.entries.pop_front()?;
        self.members.remove(&entry.connection_id);
        Some(entry)
    }

    /// Drop a waiting entry by connection id; false if it was not queued
    pub fn remove(&mut self, connection_id: &str) -> bool {
        if !self.members.remove(connection_id) {
            return false;
        }
        self.entries.retain(|e| e.connection_id != connection_id);
        true
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.members.contains(connection_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
