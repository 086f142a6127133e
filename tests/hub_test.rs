// Integration tests for the matchmaking hub: pairing order, room
// lifecycle, moderation on the message path, and state consistency.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use warp::ws::Message;

use pairlink::core::connection::ConnectionStatus;
use pairlink::core::hub::{ChatHub, ConnectOutcome, SharedHub};
use pairlink::error::PairlinkError;

async fn connect(hub: &ChatHub, ip: &str) -> (String, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    match hub.connect(ip.parse().unwrap(), tx).await {
        ConnectOutcome::Accepted { connection_id } => (connection_id, rx),
        ConnectOutcome::Banned => panic!("connection unexpectedly banned"),
    }
}

/// Connect and enqueue a named user; returns the connection id
async fn join_queue(hub: &ChatHub, name: &str) -> (String, mpsc::UnboundedReceiver<Message>) {
    let (id, rx) = connect(hub, "127.0.0.1").await;
    hub.find_chat(&id, name.to_string(), None).await.unwrap();
    (id, rx)
}

/// Connect two users and pair them; returns (first_id, second_id, room_id)
async fn paired_room(
    hub: &ChatHub,
) -> (
    String,
    String,
    String,
    mpsc::UnboundedReceiver<Message>,
    mpsc::UnboundedReceiver<Message>,
) {
    let (id_a, rx_a) = connect(hub, "127.0.0.1").await;
    let (id_b, rx_b) = connect(hub, "127.0.0.1").await;

    hub.find_chat(&id_a, "alice".to_string(), None).await.unwrap();
    let outcome = hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    let room_id = outcome.matched.expect("second find should match").room_id;

    (id_a, id_b, room_id, rx_a, rx_b)
}

#[tokio::test]
async fn test_pairing_follows_arrival_order() {
    let hub = ChatHub::new();
    let (id_a, _rx_a) = join_queue(&hub, "alice").await;
    let (id_b, _rx_b) = connect(&hub, "127.0.0.1").await;
    let (id_c, _rx_c) = connect(&hub, "127.0.0.1").await;

    let outcome_b = hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    let pair = outcome_b.matched.expect("two waiting users should match");
    assert_eq!(pair.first.connection_id, id_a);
    assert_eq!(pair.second.connection_id, id_b);

    // The third user keeps waiting
    let outcome_c = hub.find_chat(&id_c, "carol".to_string(), None).await.unwrap();
    assert!(outcome_c.queued);
    assert!(outcome_c.matched.is_none());

    let stats = hub.stats().await;
    assert_eq!(stats.active_rooms, 1);
    assert_eq!(stats.queue_depth, 1);
}

#[tokio::test]
async fn test_repeat_find_chat_is_a_noop() {
    let hub = ChatHub::new();
    let (id, _rx) = join_queue(&hub, "alice").await;

    let again = hub.find_chat(&id, "alice".to_string(), None).await.unwrap();
    assert!(!again.queued);
    assert!(again.matched.is_none());
    assert_eq!(hub.stats().await.queue_depth, 1);

    // Same for a user already in a room
    let (id_b, _rx_b) = join_queue(&hub, "bob").await;
    let in_room = hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    assert!(!in_room.queued);
    assert_eq!(hub.stats().await.queue_depth, 0);
}

#[tokio::test]
async fn test_cancel_search_leaves_the_queue() {
    let hub = ChatHub::new();
    let (id, _rx) = join_queue(&hub, "alice").await;
    assert_eq!(hub.stats().await.queue_depth, 1);

    assert!(hub.cancel_search(&id).await);
    assert_eq!(hub.stats().await.queue_depth, 0);

    // Second cancel is a negative no-op
    assert!(!hub.cancel_search(&id).await);

    // The connection can search again afterwards
    let outcome = hub.find_chat(&id, "alice".to_string(), None).await.unwrap();
    assert!(outcome.queued);
}

#[tokio::test]
async fn test_registry_and_room_index_stay_in_agreement() {
    let hub = ChatHub::new();
    let (id_a, id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    for conn in hub.list_connections().await {
        assert_eq!(conn.status, ConnectionStatus::InRoom);
        assert_eq!(conn.room_id.as_deref(), Some(room_id.as_str()));
    }
    let rooms = hub.list_rooms().await;
    assert_eq!(rooms.len(), 1);
    let members: Vec<&str> = rooms[0]
        .participants
        .iter()
        .map(|p| p.connection_id.as_str())
        .collect();
    assert!(members.contains(&id_a.as_str()));
    assert!(members.contains(&id_b.as_str()));

    // Teardown clears both sides
    hub.end_chat(&id_a, &room_id).await.unwrap();
    for conn in hub.list_connections().await {
        assert_eq!(conn.status, ConnectionStatus::Connected);
        assert!(conn.room_id.is_none());
    }
    assert!(hub.list_rooms().await.is_empty());
}

#[tokio::test]
async fn test_concurrent_find_chat_keeps_state_consistent() {
    let hub: SharedHub = Arc::new(ChatHub::new());

    let mut receivers = Vec::new();
    let mut ids = Vec::new();
    for _ in 0..10 {
        let (id, rx) = connect(&hub, "127.0.0.1").await;
        ids.push(id);
        receivers.push(rx);
    }

    let mut handles = Vec::new();
    for (i, id) in ids.iter().cloned().enumerate() {
        let hub = hub.clone();
        handles.push(tokio::spawn(async move {
            hub.find_chat(&id, format!("user-{}", i), None).await.unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let stats = hub.stats().await;
    assert_eq!(stats.active_connections, 10);
    assert_eq!(stats.active_rooms, 5);
    assert_eq!(stats.queue_depth, 0);

    // Every connection points at a room that exists and contains it
    let rooms: HashMap<String, Vec<String>> = hub
        .list_rooms()
        .await
        .into_iter()
        .map(|r| {
            let members = r
                .participants
                .iter()
                .map(|p| p.connection_id.clone())
                .collect();
            (r.room_id, members)
        })
        .collect();
    for conn in hub.list_connections().await {
        assert_eq!(conn.status, ConnectionStatus::InRoom);
        let room_id = conn.room_id.expect("every connection should be in a room");
        let members = rooms.get(&room_id).expect("room should be indexed");
        assert!(members.contains(&conn.connection_id));
    }
}

#[tokio::test]
async fn test_post_message_redacts_filtered_terms() {
    let hub = ChatHub::new();
    let (id_a, _id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    let clean = hub.post_message(&id_a, &room_id, "hello there").await.unwrap();
    assert_eq!(clean.content, "hello there");
    assert_eq!(clean.sender_name, "alice");

    let masked = hub
        .post_message(&id_a, &room_id, "This is SPAM, pure spam")
        .await
        .unwrap();
    assert_eq!(masked.content, "This is ***, pure ***");
}

#[tokio::test]
async fn test_sixth_rapid_message_is_throttled() {
    let hub = ChatHub::new();
    let (id_a, id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    for i in 0..5 {
        hub.post_message(&id_a, &room_id, &format!("msg-{}", i))
            .await
            .unwrap();
    }
    let result = hub.post_message(&id_a, &room_id, "one too many").await;
    assert!(matches!(result, Err(PairlinkError::RateLimited)));

    // The rejected message was not stored
    assert_eq!(hub.list_rooms().await[0].message_count, 5);

    // The partner's budget is untouched
    assert!(hub.post_message(&id_b, &room_id, "still fine").await.is_ok());
}

#[tokio::test]
async fn test_end_chat_is_not_repeatable() {
    let hub = ChatHub::new();
    let (id_a, id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    let closed = hub.end_chat(&id_a, &room_id).await.unwrap();
    assert_eq!(closed.ended_by, id_a);
    assert_eq!(closed.message, "alice left the chat");
    assert_eq!(closed.recipients.len(), 2);

    // Both repeat attempts fail: the room is gone and both room
    // pointers are cleared
    assert!(hub.end_chat(&id_a, &room_id).await.is_err());
    assert!(hub.end_chat(&id_b, &room_id).await.is_err());
    assert!(hub.list_rooms().await.is_empty());
}

#[tokio::test]
async fn test_message_to_closed_room_is_rejected() {
    let hub = ChatHub::new();
    let (id_a, id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    hub.end_chat(&id_b, &room_id).await.unwrap();

    let result = hub.post_message(&id_a, &room_id, "anyone here?").await;
    assert!(matches!(result, Err(PairlinkError::Validation(_))));
}

#[tokio::test]
async fn test_banned_address_is_refused_before_registration() {
    let hub = ChatHub::new();
    let banned_ip = "203.0.113.9";

    // Ban with no live connections affected
    assert!(hub.ban_address(banned_ip.parse().unwrap()).await.is_empty());

    let (tx, _rx) = mpsc::unbounded_channel();
    let outcome = hub.connect(banned_ip.parse().unwrap(), tx).await;
    assert!(matches!(outcome, ConnectOutcome::Banned));

    // Nothing was registered or recorded for the refused attempt
    assert_eq!(hub.stats().await.active_connections, 0);
    let connect_events = hub
        .recent_events(100)
        .await
        .into_iter()
        .filter(|e| e.kind == "user_connected")
        .count();
    assert_eq!(connect_events, 0);
}

#[tokio::test]
async fn test_ban_mid_session_tears_down_the_room() {
    let hub = ChatHub::new();
    let (id_a, rx_a) = connect(&hub, "198.51.100.7").await;
    let (id_b, _rx_b) = connect(&hub, "127.0.0.1").await;
    hub.find_chat(&id_a, "alice".to_string(), None).await.unwrap();
    hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    drop(rx_a);

    let targets = hub.ban_address("198.51.100.7".parse().unwrap()).await;
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].connection_id, id_a);
    let closed = targets[0].closed_room.as_ref().expect("room should close");
    assert!(closed.recipients.contains(&id_b));

    // The partner is back to a clean connected state
    let partner = hub
        .list_connections()
        .await
        .into_iter()
        .find(|c| c.connection_id == id_b)
        .unwrap();
    assert_eq!(partner.status, ConnectionStatus::Connected);
    assert!(partner.room_id.is_none());

    let banned = hub.banned_addresses().await;
    assert_eq!(banned.len(), 1);
    assert!(hub.unban_address("198.51.100.7".parse().unwrap()).await);
    assert!(!hub.unban_address("198.51.100.7".parse().unwrap()).await);
}

#[tokio::test]
async fn test_ban_mid_session_revokes_matchmaking_and_posting() {
    let hub = ChatHub::new();
    let (id_a, _rx_a) = connect(&hub, "203.0.113.9").await;
    let (id_b, _rx_b) = connect(&hub, "127.0.0.1").await;
    hub.find_chat(&id_a, "mallory".to_string(), None).await.unwrap();
    let outcome = hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    let room_id = outcome.matched.expect("pair should match").room_id;

    hub.ban_address("203.0.113.9".parse().unwrap()).await;

    // The severed connection cannot slip back into the queue
    let rejoin = hub.find_chat(&id_a, "mallory".to_string(), None).await;
    assert!(matches!(rejoin, Err(PairlinkError::Banned)));
    assert_eq!(hub.stats().await.queue_depth, 0);

    // Nor post through its stale room reference
    let post = hub.post_message(&id_a, &room_id, "hello?").await;
    assert!(matches!(post, Err(PairlinkError::Banned)));

    // A later arrival is paired with the partner, never with the
    // banned connection
    let (id_c, _rx_c) = join_queue(&hub, "carol").await;
    let outcome = hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    let pair = outcome.matched.expect("partner and newcomer should match");
    assert_eq!(pair.first.connection_id, id_c);
    assert_eq!(pair.second.connection_id, id_b);
    assert_eq!(hub.stats().await.active_rooms, 1);
}

#[tokio::test]
async fn test_disconnect_cleans_up_exactly_once() {
    let hub = ChatHub::new();
    let (id_a, id_b, _room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    let summary = hub.disconnect(&id_a).await.expect("first disconnect");
    assert_eq!(summary.username.as_deref(), Some("alice"));
    let closed = summary.closed_room.expect("room should close");
    assert_eq!(closed.recipients, vec![id_b.clone()]);

    // Second disconnect finds nothing to clean up
    assert!(hub.disconnect(&id_a).await.is_none());

    let stats = hub.stats().await;
    assert_eq!(stats.active_connections, 1);
    assert_eq!(stats.active_rooms, 0);
}

#[tokio::test]
async fn test_queued_disconnect_leaves_the_queue() {
    let hub = ChatHub::new();
    let (id_a, _rx_a) = join_queue(&hub, "alice").await;
    assert_eq!(hub.stats().await.queue_depth, 1);

    hub.disconnect(&id_a).await.unwrap();
    assert_eq!(hub.stats().await.queue_depth, 0);

    // A later arrival must not be paired with the departed connection
    let (id_b, _rx_b) = join_queue(&hub, "bob").await;
    let outcome = hub.find_chat(&id_b, "bob".to_string(), None).await.unwrap();
    assert!(!outcome.queued);
    assert_eq!(hub.stats().await.queue_depth, 1);
}

#[tokio::test]
async fn test_typing_relay_targets_the_partner() {
    let hub = ChatHub::new();
    let (id_a, id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    let relay = hub.relay_typing(&id_a, &room_id).await.unwrap();
    assert_eq!(relay.partner_id, id_b);
    assert_eq!(relay.username, "alice");

    // A bogus room is a validation failure, reported not ignored
    let result = hub.relay_typing(&id_a, "no-such-room").await;
    assert!(matches!(result, Err(PairlinkError::Validation(_))));
}

#[tokio::test]
async fn test_force_disconnect_clears_session_state() {
    let hub = ChatHub::new();
    let (id_a, id_b, _room_id, _rx_a, _rx_b) = paired_room(&hub).await;

    let outcome = hub.force_disconnect(&id_a).await.expect("known connection");
    assert_eq!(outcome.username, "alice");
    let closed = outcome.closed_room.expect("room should close");
    assert_eq!(closed.ended_by, "admin");
    assert_eq!(closed.message, "Chat ended by admin");
    assert!(closed.recipients.contains(&id_b));

    // The registry entry survives until the transport closes
    assert_eq!(hub.stats().await.active_connections, 2);
    assert!(hub.force_disconnect("missing").await.is_none());
}

#[tokio::test]
async fn test_event_log_records_the_session_story() {
    let hub = ChatHub::new();
    let (id_a, id_b, room_id, _rx_a, _rx_b) = paired_room(&hub).await;
    hub.end_chat(&id_a, &room_id).await.unwrap();
    hub.disconnect(&id_a).await.unwrap();
    hub.disconnect(&id_b).await.unwrap();

    let kinds: Vec<String> = hub
        .recent_events(100)
        .await
        .into_iter()
        .map(|e| e.kind)
        .collect();
    assert_eq!(kinds.iter().filter(|k| *k == "user_connected").count(), 2);
    assert_eq!(kinds.iter().filter(|k| *k == "match_created").count(), 1);
    assert_eq!(kinds.iter().filter(|k| *k == "chat_ended").count(), 1);
    assert_eq!(kinds.iter().filter(|k| *k == "user_disconnected").count(), 2);
}
