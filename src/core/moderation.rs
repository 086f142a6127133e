//! Moderation filters: word redaction, spam detection, and the ban list
//!
//! All three are plain structures; the hub serializes access to them.

use log::debug;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use crate::constants::FILTER_MASK;

/// Network addresses refused service
pub struct BanList {
    addresses: HashSet<IpAddr>,
}

impl BanList {
    pub fn new() -> Self {
        Self {
            addresses: HashSet::new(),
        }
    }

    /// Ban an address; false if it was already banned
    pub fn insert(&mut self, addr: IpAddr) -> bool {
        self.addresses.insert(addr)
    }

    /// Lift a ban; false if the address was not banned
    pub fn remove(&mut self, addr: &IpAddr) -> bool {
        self.addresses.remove(addr)
    }

    pub fn contains(&self, addr: &IpAddr) -> bool {
        self.addresses.contains(addr)
    }

    pub fn addresses(&self) -> Vec<IpAddr> {
        self.addresses.iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }
}

/// Case-insensitive masking of configured terms
pub struct WordFilter {
    terms: Vec<String>,
}

impl WordFilter {
    /// Terms are matched case-insensitively and applied in list order
    pub fn new(terms: Vec<String>) -> Self {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Replace every occurrence of every configured term with the mask
    pub fn redact(&self, text: &str) -> String {
        let mut filtered = text.to_string();
        for term in &self.terms {
            filtered = mask_occurrences(&filtered, term);
        }
        filtered
    }
}

/// Replace each case-insensitive, non-overlapping occurrence of `term`
/// (already lowercased) with the mask token, left to right.
fn mask_occurrences(text: &str, term: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut rest = text;
    while let Some((start, end)) = find_case_insensitive(rest, term) {
        result.push_str(&rest[..start]);
        result.push_str(FILTER_MASK);
        rest = &rest[end..];
    }
    result.push_str(rest);
    result
}

/// Byte range of the first case-insensitive occurrence of `needle_lower`
/// in `haystack`. Works on char boundaries, so multi-byte text cannot
/// split a code point.
fn find_case_insensitive(haystack: &str, needle_lower: &str) -> Option<(usize, usize)> {
    let needle_chars = needle_lower.chars().count();
    if needle_chars == 0 {
        return None;
    }

    let boundaries: Vec<usize> = haystack.char_indices().map(|(i, _)| i).collect();
    if needle_chars > boundaries.len() {
        return None;
    }

    for pos in 0..=(boundaries.len() - needle_chars) {
        let start = boundaries[pos];
        let end = boundaries
            .get(pos + needle_chars)
            .copied()
            .unwrap_or(haystack.len());
        if haystack[start..end].to_lowercase() == needle_lower {
            return Some((start, end));
        }
    }
    None
}

/// Sliding-window spam detector.
///
/// A connection may send at most `max_messages` within `window`. The
/// check runs before admission: at the cap the attempt is rejected and
/// not recorded, so a sustained flood stays rejected until enough old
/// sends age out of the window.
pub struct SpamGuard {
    window: Duration,
    max_messages: usize,
    timestamps: HashMap<String, Vec<Instant>>,
}

impl SpamGuard {
    pub fn new(window: Duration, max_messages: usize) -> Self {
        Self {
            window,
            max_messages,
            timestamps: HashMap::new(),
        }
    }

    /// True when the message is admitted (and recorded) at `now`.
    /// Taking the clock as a parameter keeps the window testable.
    pub fn check_at(&mut self, connection_id: &str, now: Instant) -> bool {
        let times = self.timestamps.entry(connection_id.to_string()).or_default();
        times.retain(|&t| now.duration_since(t) < self.window);

        if times.len() >= self.max_messages {
            debug!("Spam threshold reached for connection {}", connection_id);
            return false;
        }

        times.push(now);
        true
    }

    /// Admission check against the current time
    pub fn check(&mut self, connection_id: &str) -> bool {
        self.check_at(connection_id, Instant::now())
    }

    /// Drop tracking state for a departed connection
    pub fn forget(&mut self, connection_id: &str) {
        self.timestamps.remove(connection_id);
    }
}
