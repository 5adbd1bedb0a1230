//! Outbound message delivery.
//!
//! Each live WebSocket registers an unbounded channel under its connection
//! id; the socket task drains it. Sending is synchronous and never touches
//! room state, so callers can hold nothing while delivering. A room-group
//! broadcast is just a fan-out over the roster (player id == connection id).

use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;

use crate::protocol::ServerMessage;
use crate::types::{ConnectionId, PlayerId};

#[derive(Default)]
pub struct Transport {
    senders: DashMap<ConnectionId, UnboundedSender<ServerMessage>>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: ConnectionId, sender: UnboundedSender<ServerMessage>) {
        self.senders.insert(connection_id, sender);
    }

    pub fn unregister(&self, connection_id: &str) {
        self.senders.remove(connection_id);
    }

    /// Deliver to one connection. Unknown or closed connections are
    /// dropped silently; a disconnected player's messages simply never
    /// arrive.
    pub fn send(&self, connection_id: &str, msg: ServerMessage) {
        if let Some(sender) = self.senders.get(connection_id) {
            let _ = sender.send(msg);
        }
    }

    pub fn broadcast<'a, I>(&self, recipients: I, msg: &ServerMessage)
    where
        I: IntoIterator<Item = &'a PlayerId>,
    {
        for recipient in recipients {
            self.send(recipient, msg.clone());
        }
    }
}
