//! # smartcode-collab — real-time collaborative editing sessions
//!
//! The session coordinator behind the shared code editor: independent
//! WebSocket connections join a room by id, see each other's presence, and
//! receive low-latency broadcasts of edits, typing activity, and language
//! switches.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     WebSocket      ┌──────────────┐
//! │ CollabClient │ ◄────────────────► │ CollabServer │
//! │  (per user)  │    JSON frames     │  (central)   │
//! └──────────────┘                    └──────┬───────┘
//!                                            │ inbound queue
//!                                            ▼
//!                                   ┌─────────────────┐
//!                                   │ EventDispatcher │── ConnectionHandle
//!                                   │  (single task)  │── PresenceCoordinator
//!                                   └─────────────────┘        │
//!                                                              ▼
//!                                                        RoomRegistry
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] — JSON wire protocol (`event` tag + `data` payload)
//! - [`connection`] — per-connection state: id, outbound queue, room session
//! - [`registry`] — room id → insertion-ordered member names
//! - [`presence`] — join/leave transitions and membership snapshots
//! - [`dispatcher`] — event routing and broadcast fan-out, single-task
//! - [`server`] — WebSocket server with origin allow-list
//! - [`client`] — typed client for front ends and tests
//!
//! Membership is in-memory only; no history survives a restart, and
//! concurrent edits resolve last-write-wins at each receiver.

pub mod client;
pub mod connection;
pub mod dispatcher;
pub mod presence;
pub mod protocol;
pub mod registry;
pub mod server;

// Re-exports for convenience
pub use client::CollabClient;
pub use connection::{ConnectionHandle, ConnectionId, RoomSession};
pub use dispatcher::{Delivery, EventDispatcher, Inbound};
pub use presence::{PresenceCoordinator, PresenceUpdate};
pub use protocol::{
    ClientEvent, CodeChangePayload, JoinPayload, LanguageChangePayload, ProtocolError,
    ServerEvent, TypingPayload,
};
pub use registry::RoomRegistry;
pub use server::{CollabServer, ServerConfig, ServerStats};
