//! Pairing engine: consumes the waiting queue two entries at a time

use crate::core::queue::{QueueEntry, WaitingQueue};

/// Pop the two longest-waiting entries, in arrival order.
///
/// Returns None without touching the queue when fewer than two
/// connections are waiting, so callers can invoke it opportunistically
/// after every enqueue.
pub fn try_match(queue: &mut WaitingQueue) -> Option<(QueueEntry, QueueEntry)> {
    if queue.len() < 2 {
        return None;
    }

    // Both pops are infallible after the length check
    let first = queue.pop_front()?;
    let second = queue.pop_front()?;
    Some((first, second))
}
