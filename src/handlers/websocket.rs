use futures_util::sink::SinkExt;
use futures_util::stream::StreamExt;
use log::{debug, error, info};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use tokio::sync::mpsc;
use warp::ws::{Message, WebSocket};

use crate::core::hub::{ConnectOutcome, SharedHub};
use crate::core::protocol::ServerEvent;
use crate::handlers::dispatcher::EventDispatcher;

// Handle a WebSocket connection from upgrade to disconnect
pub async fn handle_ws_client(ws: WebSocket, remote: Option<SocketAddr>, hub: SharedHub) {
    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, rx) = mpsc::unbounded_channel();

    // Spawn a task to forward queued outbound frames to the WebSocket
    tokio::task::spawn(async move {
        let mut rx = rx;
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_tx.send(message).await {
                debug!("Failed to send WebSocket message: {}", e);
                break;
            }
        }
    });

    // Proxy header extraction is out of scope; the socket address is
    // authoritative, with a localhost fallback for missing peers
    let addr = remote
        .map(|a| a.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));

    // Ban gate: refused connections are notified and closed without
    // ever being registered
    let connection_id = match hub.connect(addr, tx.clone()).await {
        ConnectOutcome::Accepted { connection_id } => connection_id,
        ConnectOutcome::Banned => {
            let notice = ServerEvent::Banned {
                message: "You have been banned from this server".to_string(),
            };
            let _ = tx.send(Message::text(notice.to_json()));
            let _ = tx.send(Message::close());
            return;
        }
    };

    let dispatcher = EventDispatcher::new(hub.clone());

    // Inbound event loop
    while let Some(result) = ws_rx.next().await {
        match result {
            Ok(msg) => {
                if msg.is_close() {
                    break;
                }
                // Only text frames carry protocol events
                if msg.is_text() {
                    if let Ok(text) = msg.to_str() {
                        if !dispatcher.handle_text(&connection_id, text).await {
                            break;
                        }
                    }
                }
            }
            Err(e) => {
                error!("WebSocket error on {}: {}", connection_id, e);
                break;
            }
        }
    }

    // Disconnect cleanup; the hub guarantees this runs exactly once,
    // so a racing admin disconnect cannot double-notify the partner
    if let Some(summary) = hub.disconnect(&connection_id).await {
        if let Some(closed) = summary.closed_room {
            let event = ServerEvent::ChatEnded {
                room_id: closed.room_id.clone(),
                message: closed.message.clone(),
                ended_by: closed.ended_by.clone(),
            };
            let payload = event.to_json();
            for recipient in &closed.recipients {
                hub.send_to_connection(recipient, &payload).await;
            }
        }
        info!(
            "Client disconnected: {} ({})",
            connection_id,
            summary.username.as_deref().unwrap_or("Anonymous")
        );
    }
}
