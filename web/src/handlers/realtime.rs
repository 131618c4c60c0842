//! Realtime WebSocket channel.
//!
//! Each connection registers one observer with the broadcaster and may join
//! any number of per-event groups. When an event changes, the connection
//! receives a `refresh` signal and the client re-fetches the event over
//! HTTP. Clients can only subscribe and unsubscribe; nothing they send can
//! cause a refresh.
//!
//! # Message Protocol
//!
//! **Client → Server:**
//! ```json
//! { "type": "subscribe", "event_id": "…" }
//! { "type": "unsubscribe", "event_id": "…" }
//! { "type": "ping" }
//! ```
//!
//! **Server → Client:**
//! ```json
//! { "type": "subscribed", "event_id": "…" }
//! { "type": "unsubscribed", "event_id": "…" }
//! { "type": "refresh", "event_id": "…" }
//! { "type": "pong" }
//! { "type": "error", "message": "…" }
//! ```

use crate::error::AppError;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::{IntoResponse, Response},
};
use futures::{stream::StreamExt, SinkExt};
use rally_core::EventId;
use rally_runtime::{Observer, Refresh, Subscriptions};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info, warn};

/// Default cap on concurrent realtime connections.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// Message from client to server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Start watching an event
    Subscribe {
        /// Event to watch
        event_id: EventId,
    },
    /// Stop watching an event
    Unsubscribe {
        /// Event to stop watching
        event_id: EventId,
    },
    /// Keep-alive
    Ping,
}

/// Message from server to client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Subscription confirmed
    Subscribed {
        /// Watched event
        event_id: EventId,
    },
    /// Unsubscription confirmed
    Unsubscribed {
        /// Event no longer watched
        event_id: EventId,
    },
    /// The event changed; re-fetch it
    Refresh {
        /// Changed event
        event_id: EventId,
    },
    /// Keep-alive response
    Pong,
    /// Protocol error
    Error {
        /// Error description
        message: String,
    },
}

impl From<Refresh> for ServerMessage {
    fn from(refresh: Refresh) -> Self {
        Self::Refresh {
            event_id: refresh.event_id,
        }
    }
}

/// Shared state for the realtime endpoint.
#[derive(Debug, Clone)]
pub struct Realtime {
    subscriptions: Subscriptions,
    slots: Arc<Semaphore>,
}

impl Realtime {
    /// Create the endpoint state, admitting at most `max_connections`.
    #[must_use]
    pub fn new(subscriptions: Subscriptions, max_connections: usize) -> Self {
        Self {
            subscriptions,
            slots: Arc::new(Semaphore::new(max_connections)),
        }
    }

    /// The observer-side broadcaster handle.
    #[must_use]
    pub const fn subscriptions(&self) -> &Subscriptions {
        &self.subscriptions
    }

    /// Claim a connection slot, or `None` at the limit.
    ///
    /// The slot is released when the returned guard drops.
    #[must_use]
    pub fn try_admit(&self) -> Option<ConnectionSlot> {
        let permit = Arc::clone(&self.slots).try_acquire_owned().ok()?;
        metrics::gauge!("rally_realtime_connections").increment(1.0);
        Some(ConnectionSlot { _permit: permit })
    }

    /// Connection slots currently free.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.slots.available_permits()
    }
}

/// One admitted realtime connection.
#[derive(Debug)]
pub struct ConnectionSlot {
    _permit: OwnedSemaphorePermit,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        metrics::gauge!("rally_realtime_connections").decrement(1.0);
    }
}

/// `GET /api/ws`: upgrade to the realtime channel.
///
/// Responds 503 when the connection limit is reached.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn handle(ws: WebSocketUpgrade, State(realtime): State<Realtime>) -> Response {
    let Some(slot) = realtime.try_admit() else {
        warn!("Realtime connection limit reached");
        return AppError::unavailable("Too many realtime connections, please retry later")
            .into_response();
    };

    ws.on_upgrade(move |socket| handle_socket(socket, realtime.subscriptions, slot))
}

/// Apply one client message to the observer's subscriptions and produce the
/// reply.
pub fn apply_client_message(
    subscriptions: &Subscriptions,
    observer: &Observer,
    message: ClientMessage,
) -> ServerMessage {
    match message {
        ClientMessage::Subscribe { event_id } => {
            subscriptions.subscribe(event_id, observer);
            debug!(%event_id, observer = %observer.id(), "Observer subscribed");
            ServerMessage::Subscribed { event_id }
        }
        ClientMessage::Unsubscribe { event_id } => {
            subscriptions.unsubscribe(event_id, observer);
            debug!(%event_id, observer = %observer.id(), "Observer unsubscribed");
            ServerMessage::Unsubscribed { event_id }
        }
        ClientMessage::Ping => ServerMessage::Pong,
    }
}

/// Parse a text frame and apply it.
pub fn handle_text(subscriptions: &Subscriptions, observer: &Observer, text: &str) -> ServerMessage {
    match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => apply_client_message(subscriptions, observer, message),
        Err(e) => {
            debug!(error = %e, "Unparseable realtime message");
            ServerMessage::Error {
                message: format!("Invalid message: {e}"),
            }
        }
    }
}

async fn handle_socket(socket: WebSocket, subscriptions: Subscriptions, slot: ConnectionSlot) {
    let (observer, mut refreshes) = subscriptions.register();
    info!(observer = %observer.id(), "Realtime connection established");

    let (mut sender, mut receiver) = socket.split();

    loop {
        let reply = tokio::select! {
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => handle_text(&subscriptions, &observer, &text),
                Some(Ok(Message::Binary(_))) => ServerMessage::Error {
                    message: "Binary messages are not supported".to_string(),
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                Some(Ok(Message::Close(_))) | None => {
                    debug!(observer = %observer.id(), "Client closed connection");
                    break;
                }
                Some(Err(e)) => {
                    debug!(observer = %observer.id(), error = %e, "WebSocket receive failed");
                    break;
                }
            },
            Some(refresh) = refreshes.recv() => ServerMessage::from(refresh),
        };

        let Ok(json) = serde_json::to_string(&reply) else {
            continue;
        };
        if sender.send(Message::Text(json)).await.is_err() {
            debug!(observer = %observer.id(), "Client disconnected during send");
            break;
        }
    }

    let removed = subscriptions.unsubscribe_all(&observer);
    drop(slot);
    info!(observer = %observer.id(), groups = removed, "Realtime connection closed");
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code
mod tests {
    use super::*;
    use rally_runtime::Broadcaster;
    use rally_core::Notifier;

    #[test]
    fn test_wire_format() {
        let id = EventId::new();

        let parsed: ClientMessage =
            serde_json::from_str(&format!(r#"{{"type":"subscribe","event_id":"{id}"}}"#)).unwrap();
        assert_eq!(parsed, ClientMessage::Subscribe { event_id: id });

        let parsed: ClientMessage = serde_json::from_str(r#"{"type":"ping"}"#).unwrap();
        assert_eq!(parsed, ClientMessage::Ping);

        let json = serde_json::to_value(ServerMessage::Refresh { event_id: id }).unwrap();
        assert_eq!(json["type"], "refresh");
        assert_eq!(json["event_id"], id.to_string());

        let json = serde_json::to_value(ServerMessage::Pong).unwrap();
        assert_eq!(json, serde_json::json!({"type": "pong"}));
    }

    #[test]
    fn test_clients_cannot_send_refresh() {
        let broadcaster = Broadcaster::default();
        let subscriptions = broadcaster.subscriptions();
        let (observer, mut rx) = subscriptions.register();
        let id = EventId::new();

        let reply = handle_text(
            &subscriptions,
            &observer,
            &format!(r#"{{"type":"refresh","event_id":"{id}"}}"#),
        );

        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_subscribe_then_notify_then_unsubscribe() {
        let broadcaster = Broadcaster::default();
        let subscriptions = broadcaster.subscriptions();
        let (observer, mut rx) = subscriptions.register();
        let id = EventId::new();

        let reply = apply_client_message(&subscriptions, &observer, ClientMessage::Subscribe { event_id: id });
        assert_eq!(reply, ServerMessage::Subscribed { event_id: id });

        assert_eq!(broadcaster.notify(id), 1);
        assert_eq!(ServerMessage::from(rx.try_recv().unwrap()), ServerMessage::Refresh { event_id: id });

        let reply = apply_client_message(&subscriptions, &observer, ClientMessage::Unsubscribe { event_id: id });
        assert_eq!(reply, ServerMessage::Unsubscribed { event_id: id });
        assert_eq!(broadcaster.notify(id), 0);
        assert_eq!(broadcaster.group_count(), 0);
    }

    #[test]
    fn test_malformed_event_id_is_an_error() {
        let broadcaster = Broadcaster::default();
        let subscriptions = broadcaster.subscriptions();
        let (observer, _rx) = subscriptions.register();

        let reply = handle_text(&subscriptions, &observer, r#"{"type":"subscribe","event_id":"42"}"#);

        assert!(matches!(reply, ServerMessage::Error { .. }));
        assert_eq!(broadcaster.group_count(), 0);
    }

    #[test]
    fn test_connection_limit() {
        let realtime = Realtime::new(Broadcaster::default().subscriptions(), 2);

        let first = realtime.try_admit().expect("first slot");
        let _second = realtime.try_admit().expect("second slot");
        assert!(realtime.try_admit().is_none());

        drop(first);
        assert_eq!(realtime.available_slots(), 1);
        assert!(realtime.try_admit().is_some());
    }
}
