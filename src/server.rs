//! WebSocket server for collaborative editing sessions.
//!
//! Architecture:
//! ```text
//! Client A ──┐
//!             ├── accept loop ── connection task (decode/encode frames)
//! Client B ──┘                        │            ▲
//!                                     ▼            │
//!                              inbound queue   outbound queue
//!                                     │            ▲
//!                                     ▼            │
//!                              EventDispatcher ────┘
//!                          (rooms, presence, routing)
//! ```
//!
//! Connection tasks own the sockets and do no bookkeeping; every membership
//! decision happens on the dispatcher task. When a socket closes — clean
//! close frame, protocol error, or plain EOF — the task sends exactly one
//! `Closed` message, so an abrupt disconnect produces the same cleanup as
//! an explicit `leaveRoom`.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;
use uuid::Uuid;

use crate::connection::ConnectionId;
use crate::dispatcher::{EventDispatcher, Inbound};
use crate::protocol::ClientEvent;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: String,
    /// Origins accepted at the WebSocket handshake. Empty = no check.
    pub allowed_origins: Vec<String>,
    /// Capacity of the shared inbound event queue
    pub event_queue_capacity: usize,
    /// Outbound queue capacity per connection
    pub outbound_capacity: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            allowed_origins: Vec::new(),
            event_queue_capacity: 1024,
            outbound_capacity: 256,
        }
    }
}

/// Server statistics.
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    pub total_connections: u64,
    pub active_connections: u64,
    pub total_messages: u64,
    pub active_rooms: usize,
    pub messages_dropped: u64,
}

/// The collaboration server.
pub struct CollabServer {
    config: ServerConfig,
    stats: Arc<RwLock<ServerStats>>,
}

impl CollabServer {
    /// Create a new server with the given configuration.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            stats: Arc::new(RwLock::new(ServerStats::default())),
        }
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ServerConfig::default())
    }

    /// Get the configured bind address.
    pub fn bind_addr(&self) -> &str {
        &self.config.bind_addr
    }

    /// Get server statistics.
    pub async fn stats(&self) -> ServerStats {
        self.stats.read().await.clone()
    }

    /// Start listening for WebSocket connections.
    ///
    /// Runs the accept loop and the dispatcher task. Call from an async
    /// runtime.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        log::info!("Collab server listening on {}", self.config.bind_addr);

        let (inbound_tx, inbound_rx) = mpsc::channel(self.config.event_queue_capacity);
        tokio::spawn(EventDispatcher::new().run(inbound_rx, self.stats.clone()));

        loop {
            let (stream, addr) = listener.accept().await?;
            log::debug!("New TCP connection from {addr}");

            let inbound = inbound_tx.clone();
            let config = self.config.clone();
            let stats = self.stats.clone();

            tokio::spawn(async move {
                if let Err(e) = Self::handle_connection(stream, addr, inbound, config, stats).await
                {
                    log::debug!("Connection error from {addr}: {e}");
                }
            });
        }
    }

    /// Handle a single WebSocket connection.
    async fn handle_connection(
        stream: TcpStream,
        addr: SocketAddr,
        inbound: mpsc::Sender<Inbound>,
        config: ServerConfig,
        stats: Arc<RwLock<ServerStats>>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let ws_stream = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
            if origin_allowed(&config.allowed_origins, req) {
                Ok(resp)
            } else {
                log::warn!("Rejected connection from {addr}: origin not allowed");
                let mut deny = ErrorResponse::new(Some("origin not allowed".to_string()));
                *deny.status_mut() = StatusCode::FORBIDDEN;
                Err(deny)
            }
        })
        .await?;

        let id: ConnectionId = Uuid::new_v4();
        log::info!("User connected: {id} from {addr}");

        let (outbound_tx, mut outbound_rx) = mpsc::channel(config.outbound_capacity);
        if inbound.send(Inbound::Open { id, outbound: outbound_tx }).await.is_err() {
            return Ok(());
        }

        {
            let mut s = stats.write().await;
            s.total_connections += 1;
            s.active_connections += 1;
        }

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        loop {
            tokio::select! {
                // Incoming WebSocket message
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            {
                                let mut s = stats.write().await;
                                s.total_messages += 1;
                            }
                            match ClientEvent::decode(text.as_str()) {
                                Ok(event) => {
                                    if inbound.send(Inbound::Frame { id, event }).await.is_err() {
                                        break;
                                    }
                                }
                                // Fail-silent: no error frame goes back.
                                Err(e) => {
                                    log::debug!("Ignoring malformed frame from {id}: {e}");
                                }
                            }
                        }

                        Some(Ok(Message::Ping(data))) => {
                            if ws_sender.send(Message::Pong(data)).await.is_err() {
                                break;
                            }
                        }

                        Some(Ok(Message::Close(_))) | None => {
                            log::debug!("Connection closed from {addr}");
                            break;
                        }

                        Some(Err(e)) => {
                            log::debug!("WebSocket error from {addr}: {e}");
                            break;
                        }

                        // Binary and other frames are not part of the protocol.
                        _ => {}
                    }
                }

                // Outgoing event from the dispatcher
                event = outbound_rx.recv() => {
                    match event {
                        Some(event) => {
                            let text = match event.encode() {
                                Ok(text) => text,
                                Err(e) => {
                                    log::error!("Failed to encode event for {id}: {e}");
                                    continue;
                                }
                            };
                            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                                break;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        // Reaper: identical cleanup to leaveRoom, exactly once per
        // connection regardless of how the loop above exited.
        let _ = inbound.send(Inbound::Closed { id }).await;

        {
            let mut s = stats.write().await;
            s.active_connections -= 1;
        }
        log::info!("User disconnected: {id}");

        Ok(())
    }
}

/// Check the handshake `Origin` header against the allow-list.
///
/// An empty list accepts everything; otherwise a missing or unlisted
/// origin is rejected.
fn origin_allowed(allowed: &[String], request: &Request) -> bool {
    if allowed.is_empty() {
        return true;
    }
    request
        .headers()
        .get("Origin")
        .and_then(|value| value.to_str().ok())
        .map(|origin| allowed.iter().any(|a| a == origin))
        .unwrap_or(false)
}
