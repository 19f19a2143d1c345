//! smartcode-collab — collaboration server entry point.

use smartcode_collab::server::{CollabServer, ServerConfig};

/// Origins accepted when `SMARTCODE_COLLAB_ORIGINS` is unset: the
/// production front end and the local Vite dev server.
const DEFAULT_ORIGINS: &[&str] = &["https://getsmartcode.site", "http://localhost:5173"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let bind_addr = std::env::var("SMARTCODE_COLLAB_ADDR")
        .unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let allowed_origins = match std::env::var("SMARTCODE_COLLAB_ORIGINS") {
        Ok(list) => list
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect(),
        Err(_) => DEFAULT_ORIGINS.iter().map(|s| s.to_string()).collect(),
    };

    let config = ServerConfig {
        bind_addr,
        allowed_origins,
        ..ServerConfig::default()
    };

    CollabServer::new(config).run().await
}
