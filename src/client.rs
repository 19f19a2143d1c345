//! WebSocket client for the collaboration server.
//!
//! A thin typed wrapper over one connection: send client events, read
//! decoded server events. Used by native front ends and by the integration
//! tests; reconnection policy is left to the caller.

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::protocol::{
    ClientEvent, CodeChangePayload, JoinPayload, LanguageChangePayload, ProtocolError,
    ServerEvent, TypingPayload,
};

/// Client side of a collaboration session.
pub struct CollabClient {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl CollabClient {
    /// Connect to a server at `url` (e.g. `ws://127.0.0.1:3000`).
    pub async fn connect(url: &str) -> Result<Self, ProtocolError> {
        let (ws, _) = connect_async(url)
            .await
            .map_err(|e| ProtocolError::ConnectionError(e.to_string()))?;
        Ok(Self { ws })
    }

    /// Join a room under a display name, leaving any current room.
    pub async fn join(
        &mut self,
        room_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.send(&ClientEvent::Join(JoinPayload {
            room_id: room_id.into(),
            user_name: user_name.into(),
        }))
        .await
    }

    /// Broadcast an edit to the other members of a room.
    pub async fn send_code(
        &mut self,
        room_id: impl Into<String>,
        code: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.send(&ClientEvent::CodeChange(CodeChangePayload {
            room_id: room_id.into(),
            code: code.into(),
        }))
        .await
    }

    /// Signal typing activity to the other members of a room.
    pub async fn send_typing(
        &mut self,
        room_id: impl Into<String>,
        user_name: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.send(&ClientEvent::Typing(TypingPayload {
            room_id: room_id.into(),
            user_name: user_name.into(),
        }))
        .await
    }

    /// Switch the room's editor language.
    pub async fn send_language(
        &mut self,
        room_id: impl Into<String>,
        language: impl Into<String>,
    ) -> Result<(), ProtocolError> {
        self.send(&ClientEvent::LanguageChange(LanguageChangePayload {
            room_id: room_id.into(),
            language: language.into(),
        }))
        .await
    }

    /// Leave the current room.
    pub async fn leave(&mut self) -> Result<(), ProtocolError> {
        self.send(&ClientEvent::LeaveRoom).await
    }

    /// Send a raw client event.
    pub async fn send(&mut self, event: &ClientEvent) -> Result<(), ProtocolError> {
        let text = event.encode()?;
        self.ws
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| ProtocolError::ConnectionError(e.to_string()))
    }

    /// Next decoded server event; None once the connection is closed.
    ///
    /// Frames that are not protocol events (pings, undecodable text) are
    /// skipped.
    pub async fn next_event(&mut self) -> Option<ServerEvent> {
        while let Some(msg) = self.ws.next().await {
            match msg {
                Ok(Message::Text(text)) => match ServerEvent::decode(text.as_str()) {
                    Ok(event) => return Some(event),
                    Err(e) => log::debug!("Skipping undecodable frame: {e}"),
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => {}
                Err(_) => return None,
            }
        }
        None
    }

    /// Close the connection cleanly.
    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
