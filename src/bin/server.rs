use log::{error, info, warn};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use warp::{self, Filter};

use pairlink::config::ServerConfig;
use pairlink::constants::WS_PATH;
use pairlink::core::hub::{ChatHub, SharedHub};
use pairlink::handlers::admin::admin_routes;
use pairlink::handlers::websocket::handle_ws_client;

#[tokio::main]
async fn main() {
    // Initialize env before reading configuration
    let dotenv_result = dotenvy::dotenv();

    // Initialize logging
    env_logger::init();

    match dotenv_result {
        Ok(path) => info!("Environment variables loaded from {}", path.display()),
        Err(_) => warn!("No .env file found; using process environment"),
    }

    // Load config from the environment
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Configuration: host={}, port={}", config.host, config.port);

    let config = Arc::new(config);
    let hub: SharedHub = Arc::new(ChatHub::with_config(&config));

    // Create WebSocket route
    let ws_route = warp::path(WS_PATH)
        .and(warp::ws())
        .and(warp::addr::remote())
        .and(with_hub(hub.clone()))
        .map(|ws: warp::ws::Ws, remote: Option<SocketAddr>, hub: SharedHub| {
            ws.on_upgrade(move |socket| handle_ws_client(socket, remote, hub))
        });

    // Create health check route
    let health_route = warp::path("health").map(|| {
        warp::reply::json(&serde_json::json!({
            "status": "ok",
            "timestamp": chrono::Utc::now(),
        }))
    });

    // Admin management routes
    let admin = admin_routes(hub.clone(), config.clone());

    // Combine routes
    let routes = ws_route.or(health_route).or(admin);

    // Build the server address
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(addr) => addr,
        Err(e) => {
            error!("Failed to parse server address: {}", e);
            std::process::exit(1);
        }
    };

    // Start the server
    info!("Starting pairlink server on {}", addr);

    warp::serve(routes).run(addr).await;
}

// Helper function to include the hub in request handlers
fn with_hub(hub: SharedHub) -> impl Filter<Extract = (SharedHub,), Error = Infallible> + Clone {
    warp::any().map(move || hub.clone())
}
