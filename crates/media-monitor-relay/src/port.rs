//! Hub-side connection handles.

use std::sync::Arc;

use media_monitor_core::Listener;
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Identity of one connection to the hub.
pub type PortId = Uuid;

/// A connection the hub can post to.
pub trait Port: Send + Sync {
    fn id(&self) -> PortId;

    /// Deliver a value to the connected peer, fire-and-forget.
    fn post(&self, message: Value);
}

/// Port backed by an unbounded queue. The peer side drains the receiver.
pub struct ChannelPort {
    id: PortId,
    tx: mpsc::UnboundedSender<Value>,
}

impl ChannelPort {
    /// Create a new port.
    ///
    /// Returns the port and the receiver for the peer side.
    #[must_use]
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                id: Uuid::new_v4(),
                tx,
            }),
            rx,
        )
    }
}

impl Port for ChannelPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn post(&self, message: Value) {
        if self.tx.send(message).is_err() {
            tracing::trace!(port = %self.id, "peer gone, message dropped");
        }
    }
}

/// Port that hands every value straight to a listener.
pub struct CallbackPort {
    id: PortId,
    callback: Listener,
}

impl CallbackPort {
    #[must_use]
    pub fn new(callback: Listener) -> Arc<Self> {
        Arc::new(Self {
            id: Uuid::new_v4(),
            callback,
        })
    }
}

impl Port for CallbackPort {
    fn id(&self) -> PortId {
        self.id
    }

    fn post(&self, message: Value) {
        (self.callback)(&message);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_channel_port_delivers_to_receiver() {
        let (port, mut rx) = ChannelPort::new();
        port.post(json!({"n": 1}));
        assert_eq!(rx.try_recv().unwrap(), json!({"n": 1}));
    }

    #[test]
    fn test_channel_port_tolerates_closed_peer() {
        let (port, rx) = ChannelPort::new();
        drop(rx);
        port.post(json!({"n": 1}));
    }

    #[test]
    fn test_ports_have_distinct_ids() {
        let (first, _) = ChannelPort::new();
        let (second, _) = ChannelPort::new();
        assert_ne!(first.id(), second.id());
    }
}
