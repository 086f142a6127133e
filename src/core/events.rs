//! Bounded in-memory log of notable lifecycle events
//!
//! Connects, matches, teardowns, and admin actions are recorded as
//! structured events and mirrored to the process logger. The buffer is
//! fixed-capacity; durable storage belongs to whatever consumes the
//! admin log endpoint.

use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;

/// One structured lifecycle event
#[derive(Debug, Clone, Serialize)]
pub struct ChatEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: Value,
}

/// Fixed-capacity buffer of recent events, oldest evicted first
pub struct EventLog {
    events: VecDeque<ChatEvent>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record an event, evicting the oldest entry at capacity
    pub fn record(&mut self, kind: &str, data: Value) {
        info!("event {}: {}", kind, data);
        if self.events.len() >= self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(ChatEvent {
            timestamp: Utc::now(),
            kind: kind.to_string(),
            data,
        });
    }

    /// Most recent events, oldest first, up to `limit`
    pub fn recent(&self, limit: usize) -> Vec<ChatEvent> {
        let skip = self.events.len().saturating_sub(limit);
        self.events.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
