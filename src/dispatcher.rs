//! Event dispatch: typed inbound events in, targeted deliveries out.
//!
//! ```text
//! conn task A ──┐                       ┌──► outbound queue A
//! conn task B ──┼──► inbound mpsc ──►   │
//! conn task C ──┘        │              ├──► outbound queue B
//!                        ▼              │
//!               EventDispatcher ────────┴──► outbound queue C
//!               (connections + presence)
//! ```
//!
//! All events from all connections are serialized through one queue and
//! applied by a single task, so the registry and connection table need no
//! locks and every handler runs to completion before the next event.
//! Events from one connection keep their arrival order; events from
//! different connections interleave in arrival order.
//!
//! The synchronous core (`handle`/`disconnect`) computes deliveries without
//! touching the network, so membership semantics are testable without a
//! transport.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};

use crate::connection::{ConnectionHandle, ConnectionId};
use crate::presence::{PresenceCoordinator, PresenceUpdate};
use crate::protocol::{ClientEvent, ServerEvent};
use crate::server::ServerStats;

/// One outbound event addressed to one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: ConnectionId,
    pub event: ServerEvent,
}

/// Messages from connection tasks to the dispatcher task.
#[derive(Debug)]
pub enum Inbound {
    /// A connection completed its handshake.
    Open {
        id: ConnectionId,
        outbound: mpsc::Sender<ServerEvent>,
    },
    /// A decoded client event.
    Frame { id: ConnectionId, event: ClientEvent },
    /// The transport reported disconnect. Sent exactly once per connection.
    Closed { id: ConnectionId },
}

/// Routes client events to the presence coordinator or relays them to room
/// peers. Owns all mutable session state.
#[derive(Debug, Default)]
pub struct EventDispatcher {
    connections: HashMap<ConnectionId, ConnectionHandle>,
    presence: PresenceCoordinator,
    dropped: u64,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new connection.
    pub fn register(&mut self, id: ConnectionId, outbound: mpsc::Sender<ServerEvent>) {
        self.connections.insert(id, ConnectionHandle::new(id, outbound));
    }

    /// Number of tracked connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of non-empty rooms.
    pub fn room_count(&self) -> usize {
        self.presence.registry().room_count()
    }

    /// Deliveries dropped because a peer's outbound queue was full.
    pub fn messages_dropped(&self) -> u64 {
        self.dropped
    }

    /// Route one client event. Unknown connections and events for rooms
    /// with no members produce no deliveries; nothing here fails.
    pub fn handle(&mut self, id: ConnectionId, event: ClientEvent) -> Vec<Delivery> {
        match event {
            ClientEvent::Join(p) => {
                let Some(handle) = self.connections.get_mut(&id) else {
                    return Vec::new();
                };
                let updates = self.presence.join(handle.session_mut(), &p.room_id, &p.user_name);
                log::info!("{} joined room {} as {}", id, p.room_id, p.user_name);

                // Earlier updates are post-leave snapshots of the room the
                // connection just left; it must not receive those. The
                // final update is the joined room's snapshot, which
                // includes the joiner.
                let last = updates.len() - 1;
                let mut deliveries = Vec::new();
                for (i, update) in updates.into_iter().enumerate() {
                    let skip = if i == last { None } else { Some(id) };
                    deliveries.extend(self.snapshot_deliveries(update, skip));
                }
                deliveries
            }

            ClientEvent::CodeChange(p) => {
                self.relay(id, &p.room_id, ServerEvent::CodeUpdate(p.code), false)
            }

            ClientEvent::Typing(p) => {
                self.relay(id, &p.room_id, ServerEvent::UserTyping(p.user_name), false)
            }

            // Inclusive: the sender's own language selector re-renders
            // from the broadcast too.
            ClientEvent::LanguageChange(p) => {
                self.relay(id, &p.room_id, ServerEvent::LanguageUpdate(p.language), true)
            }

            ClientEvent::LeaveRoom => {
                let Some(handle) = self.connections.get_mut(&id) else {
                    return Vec::new();
                };
                match self.presence.leave(handle.session_mut()) {
                    Some(update) => {
                        log::info!("{} left room {}", id, update.room_id);
                        self.snapshot_deliveries(update, Some(id))
                    }
                    None => Vec::new(),
                }
            }
        }
    }

    /// Transport-level disconnect: identical cleanup to an explicit
    /// `leaveRoom`, plus removal of the connection itself.
    ///
    /// The handle is removed before the leave runs, so a second disconnect
    /// (or any late event) for the same id is a no-op.
    pub fn disconnect(&mut self, id: ConnectionId) -> Vec<Delivery> {
        let Some(mut handle) = self.connections.remove(&id) else {
            return Vec::new();
        };
        match self.presence.leave(handle.session_mut()) {
            Some(update) => {
                log::info!("{} disconnected from room {}", id, update.room_id);
                self.snapshot_deliveries(update, Some(id))
            }
            None => Vec::new(),
        }
    }

    /// Push deliveries into the targets' outbound queues.
    ///
    /// A full or closed queue drops that delivery; a slow peer never stalls
    /// the dispatch loop.
    pub fn deliver(&mut self, deliveries: Vec<Delivery>) {
        for delivery in deliveries {
            if let Some(handle) = self.connections.get(&delivery.target) {
                if !handle.try_deliver(delivery.event) {
                    self.dropped += 1;
                    log::warn!("Dropped delivery to slow connection {}", delivery.target);
                }
            }
        }
    }

    /// Run the dispatch loop until every inbound sender is gone.
    pub async fn run(mut self, mut inbound: mpsc::Receiver<Inbound>, stats: Arc<RwLock<ServerStats>>) {
        while let Some(msg) = inbound.recv().await {
            let deliveries = match msg {
                Inbound::Open { id, outbound } => {
                    self.register(id, outbound);
                    Vec::new()
                }
                Inbound::Frame { id, event } => self.handle(id, event),
                Inbound::Closed { id } => self.disconnect(id),
            };
            self.deliver(deliveries);

            let mut s = stats.write().await;
            s.active_rooms = self.room_count();
            s.messages_dropped = self.dropped;
        }
        log::debug!("Dispatcher stopped");
    }

    /// Fan a membership snapshot out to the room's current connections,
    /// optionally skipping one id (the connection that just left).
    fn snapshot_deliveries(&self, update: PresenceUpdate, skip: Option<ConnectionId>) -> Vec<Delivery> {
        let event = ServerEvent::UserJoined(update.members);
        self.room_targets(&update.room_id, skip)
            .into_iter()
            .map(|target| Delivery {
                target,
                event: event.clone(),
            })
            .collect()
    }

    /// Relay a payload to the members of the *caller-supplied* room id.
    fn relay(
        &self,
        sender: ConnectionId,
        room_id: &str,
        event: ServerEvent,
        include_sender: bool,
    ) -> Vec<Delivery> {
        let skip = if include_sender { None } else { Some(sender) };
        self.room_targets(room_id, skip)
            .into_iter()
            .map(|target| Delivery {
                target,
                event: event.clone(),
            })
            .collect()
    }

    fn room_targets(&self, room_id: &str, skip: Option<ConnectionId>) -> Vec<ConnectionId> {
        self.connections
            .values()
            .filter(|handle| handle.is_in_room(room_id))
            .map(ConnectionHandle::id)
            .filter(|id| Some(*id) != skip)
            .collect()
    }
}
