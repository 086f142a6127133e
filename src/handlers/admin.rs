//! Administrative HTTP endpoints
//!
//! A thin management surface over the hub: login, aggregate stats,
//! room/connection listings, the event log, and the mutating
//! operations (force disconnect, address ban). Guarded by an opaque
//! bearer token issued to successful logins; the token is random per
//! process, so restarting the server invalidates admin sessions.

use base64::Engine;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::IpAddr;
use std::sync::Arc;
use uuid::Uuid;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::config::ServerConfig;
use crate::core::hub::SharedHub;
use crate::core::protocol::ServerEvent;

#[derive(Debug, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct DisconnectRequest {
    connection_id: String,
}

#[derive(Debug, Deserialize)]
struct AddressRequest {
    ip: String,
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    limit: Option<usize>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    success: bool,
    message: String,
}

impl ApiMessage {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

fn json_status<T: Serialize>(
    value: &T,
    status: StatusCode,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(value), status)
}

fn unauthorized() -> warp::reply::WithStatus<warp::reply::Json> {
    json_status(&ApiMessage::err("Unauthorized"), StatusCode::UNAUTHORIZED)
}

/// Mint the per-process bearer secret handed out by the login endpoint
fn issue_token(username: &str) -> String {
    let payload = format!("{}:{}", username, Uuid::new_v4());
    base64::engine::general_purpose::STANDARD.encode(payload.as_bytes())
}

fn bearer_matches(header: Option<&str>, token: &str) -> bool {
    match header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(presented) => presented == token,
        None => false,
    }
}

fn auth_header() -> impl Filter<Extract = (Option<String>,), Error = Rejection> + Clone {
    warp::header::optional::<String>("authorization")
}

/// All admin routes under /api/admin
pub fn admin_routes(
    hub: SharedHub,
    config: Arc<ServerConfig>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let token = Arc::new(issue_token(&config.admin_username));

    let login = {
        let config = config.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "login")
            .and(warp::post())
            .and(warp::body::content_length_limit(16 * 1024))
            .and(warp::body::json())
            .map(move |body: LoginRequest| {
                if body.username == config.admin_username
                    && body.password == config.admin_password
                {
                    info!("Admin login succeeded for {}", body.username);
                    json_status(
                        &serde_json::json!({ "success": true, "token": token.as_str() }),
                        StatusCode::OK,
                    )
                } else {
                    warn!("Admin login rejected");
                    json_status(
                        &ApiMessage::err("Invalid credentials"),
                        StatusCode::UNAUTHORIZED,
                    )
                }
            })
    };

    let stats = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "stats")
            .and(warp::get())
            .and(auth_header())
            .and_then(move |header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    Ok(json_status(&hub.stats().await, StatusCode::OK))
                }
            })
    };

    let chats = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "chats")
            .and(warp::get())
            .and(auth_header())
            .and_then(move |header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    Ok(json_status(&hub.list_rooms().await, StatusCode::OK))
                }
            })
    };

    let users = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "users")
            .and(warp::get())
            .and(auth_header())
            .and_then(move |header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    Ok(json_status(&hub.list_connections().await, StatusCode::OK))
                }
            })
    };

    let logs = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "logs")
            .and(warp::get())
            .and(warp::query::<LogsQuery>())
            .and(auth_header())
            .and_then(move |query: LogsQuery, header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    let limit = query.limit.unwrap_or(100);
                    Ok(json_status(&hub.recent_events(limit).await, StatusCode::OK))
                }
            })
    };

    let ban_list = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "bans")
            .and(warp::get())
            .and(auth_header())
            .and_then(move |header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    let addresses: Vec<String> = hub
                        .banned_addresses()
                        .await
                        .iter()
                        .map(|a| a.to_string())
                        .collect();
                    Ok(json_status(&addresses, StatusCode::OK))
                }
            })
    };

    let disconnect = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "disconnect")
            .and(warp::post())
            .and(warp::body::content_length_limit(16 * 1024))
            .and(warp::body::json())
            .and(auth_header())
            .and_then(move |body: DisconnectRequest, header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    match hub.force_disconnect(&body.connection_id).await {
                        Some(outcome) => {
                            let notice = ServerEvent::ForceDisconnect {
                                message: "You have been disconnected by an administrator"
                                    .to_string(),
                            };
                            hub.send_to_connection(&body.connection_id, &notice.to_json())
                                .await;
                            if let Some(closed) = outcome.closed_room {
                                let payload = ServerEvent::ChatEnded {
                                    room_id: closed.room_id.clone(),
                                    message: closed.message.clone(),
                                    ended_by: closed.ended_by.clone(),
                                }
                                .to_json();
                                for recipient in &closed.recipients {
                                    hub.send_to_connection(recipient, &payload).await;
                                }
                            }
                            hub.close_connection(&body.connection_id).await;
                            info!(
                                "Admin disconnected {} ({})",
                                body.connection_id, outcome.username
                            );
                            Ok(json_status(
                                &ApiMessage::ok("Connection disconnected"),
                                StatusCode::OK,
                            ))
                        }
                        None => Ok(json_status(
                            &ApiMessage::err("Connection not found"),
                            StatusCode::NOT_FOUND,
                        )),
                    }
                }
            })
    };

    let ban = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "ban")
            .and(warp::post())
            .and(warp::body::content_length_limit(16 * 1024))
            .and(warp::body::json())
            .and(auth_header())
            .and_then(move |body: AddressRequest, header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    let addr: IpAddr = match body.ip.parse() {
                        Ok(addr) => addr,
                        Err(_) => {
                            return Ok(json_status(
                                &ApiMessage::err("Invalid IP address"),
                                StatusCode::BAD_REQUEST,
                            ))
                        }
                    };

                    let targets = hub.ban_address(addr).await;
                    let ban_notice = ServerEvent::Banned {
                        message: "You have been banned from this server".to_string(),
                    }
                    .to_json();

                    // Every banned connection gets the ban notice only;
                    // room-close notices go to unaffected partners
                    let banned_ids: Vec<&str> =
                        targets.iter().map(|t| t.connection_id.as_str()).collect();
                    for target in &targets {
                        hub.send_to_connection(&target.connection_id, &ban_notice)
                            .await;
                        if let Some(closed) = &target.closed_room {
                            let payload = ServerEvent::ChatEnded {
                                room_id: closed.room_id.clone(),
                                message: closed.message.clone(),
                                ended_by: closed.ended_by.clone(),
                            }
                            .to_json();
                            for recipient in &closed.recipients {
                                if !banned_ids.contains(&recipient.as_str()) {
                                    hub.send_to_connection(recipient, &payload).await;
                                }
                            }
                        }
                        hub.close_connection(&target.connection_id).await;
                    }

                    Ok(json_status(
                        &serde_json::json!({
                            "success": true,
                            "message": format!("Banned IP {}", addr),
                            "disconnected_connections": targets.len(),
                        }),
                        StatusCode::OK,
                    ))
                }
            })
    };

    let unban = {
        let hub = hub.clone();
        let token = token.clone();
        warp::path!("api" / "admin" / "unban")
            .and(warp::post())
            .and(warp::body::content_length_limit(16 * 1024))
            .and(warp::body::json())
            .and(auth_header())
            .and_then(move |body: AddressRequest, header: Option<String>| {
                let hub = hub.clone();
                let token = token.clone();
                async move {
                    if !bearer_matches(header.as_deref(), &token) {
                        return Ok::<_, Infallible>(unauthorized());
                    }
                    let addr: IpAddr = match body.ip.parse() {
                        Ok(addr) => addr,
                        Err(_) => {
                            return Ok(json_status(
                                &ApiMessage::err("Invalid IP address"),
                                StatusCode::BAD_REQUEST,
                            ))
                        }
                    };

                    if hub.unban_address(addr).await {
                        Ok(json_status(
                            &ApiMessage::ok(format!("Unbanned IP {}", addr)),
                            StatusCode::OK,
                        ))
                    } else {
                        Ok(json_status(
                            &ApiMessage::err("IP not found in ban list"),
                            StatusCode::NOT_FOUND,
                        ))
                    }
                }
            })
    };

    login
        .or(stats)
        .or(chats)
        .or(users)
        .or(logs)
        .or(ban_list)
        .or(disconnect)
        .or(ban)
        .or(unban)
}
