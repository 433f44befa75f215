//! Notification Bus
//! Mission: Fan out auction changes to interested observers without the core
//! knowing anything about the transport. The WebSocket layer subscribes and
//! filters by topic; any other transport could do the same.

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Topic naming for the two per-tournament channels.
pub mod topics {
    /// Full auction snapshot after every accepted mutation.
    pub fn auction_update(tournament_id: &str) -> String {
        format!("auction_update_{tournament_id}")
    }

    /// Lightweight settlement summary, fired once per completed auction.
    pub fn auction_result(tournament_id: &str) -> String {
        format!("auction_result_{tournament_id}")
    }
}

/// One published message. Payload is already-serialized JSON so subscribers
/// never re-serialize per receiver.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Broadcast-backed publish/subscribe channel. Publishing never blocks and
/// never fails the operation that triggered it; a publish with no subscribers
/// is a no-op.
#[derive(Clone)]
pub struct NotificationBus {
    tx: broadcast::Sender<Envelope>,
}

impl NotificationBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn publish(&self, topic: String, payload: serde_json::Value) {
        let receivers = self.tx.receiver_count();
        debug!(topic = %topic, receivers, "📡 Publishing auction event");
        // Err here only means no live subscribers.
        let _ = self.tx.send(Envelope { topic, payload });
    }

    /// Serialize and publish. Serialization failures are logged and dropped
    /// rather than failing the settlement that triggered them.
    pub fn publish_json<T: Serialize>(&self, topic: String, payload: &T) {
        match serde_json::to_value(payload) {
            Ok(value) => self.publish(topic, value),
            Err(e) => warn!(topic = %topic, "Failed to serialize event payload: {}", e),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Envelope> {
        self.tx.subscribe()
    }
}
