//! Request handlers for the WebSocket endpoint and the admin surface

pub mod admin;
pub mod dispatcher;
pub mod websocket;

// Re-export the websocket handler
pub use websocket::handle_ws_client;
