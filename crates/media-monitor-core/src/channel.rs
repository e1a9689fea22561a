//! Named, source-tagged, best-effort message transport.

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::{Envelope, Message};

/// Callback bound to an endpoint. Identity is the allocation, so keep the
/// same `Arc` around to remove it later.
pub type Listener = Arc<dyn Fn(&Value) + Send + Sync>;

/// One side of a context pair: something that can receive posted values
/// and deliver them to bound listeners.
///
/// Posting never reports failure. A value sent to a context that has gone
/// away is lost.
pub trait Endpoint: Send + Sync {
    /// Bind a listener to values delivered at this endpoint.
    fn add_listener(&self, listener: Listener);

    /// Unbind a listener. Unknown listeners are ignored.
    fn remove_listener(&self, listener: &Listener);

    /// Deliver a value to this endpoint, fire-and-forget.
    fn post(&self, message: Value);
}

/// Point-to-point channel between a local receiving endpoint and a target
/// endpoint.
///
/// Every message sent carries the channel name as its `src` tag so receivers
/// can filter out traffic they did not ask for. Listeners added through the
/// channel are tracked so [`Channel::destroy`] can unbind all of them.
pub struct Channel {
    name: String,
    local: Arc<dyn Endpoint>,
    target: Arc<dyn Endpoint>,
    listeners: Mutex<Vec<Listener>>,
}

impl Channel {
    /// Create a new channel.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        local: Arc<dyn Endpoint>,
        target: Arc<dyn Endpoint>,
    ) -> Self {
        Self {
            name: name.into(),
            local,
            target,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Source tag attached to outgoing messages.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bind a listener on the local endpoint.
    pub fn add_listener(&self, listener: Listener) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&listener));
        self.local.add_listener(listener);
    }

    /// Unbind a listener previously added through this channel.
    ///
    /// Listeners this channel never added are left alone.
    pub fn remove_listener(&self, listener: &Listener) {
        let removed = {
            let mut listeners = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            listeners
                .iter()
                .position(|l| Arc::ptr_eq(l, listener))
                .map(|index| listeners.remove(index))
        };

        if let Some(listener) = removed {
            self.local.remove_listener(&listener);
        }
    }

    /// Tag a message with this channel's name and post it to the target.
    pub fn send(&self, message: Message) {
        let envelope = Envelope::new(self.name.clone(), message);
        match envelope.to_value() {
            Ok(value) => self.target.post(value),
            Err(e) => tracing::error!("Failed to serialize message: {e}"),
        }
    }

    /// Announce readiness to the other side.
    pub fn ready(&self) {
        self.send(Message::Ready);
    }

    /// Unbind every listener added through this channel.
    pub fn destroy(&self) {
        let listeners =
            std::mem::take(&mut *self.listeners.lock().unwrap_or_else(PoisonError::into_inner));

        for listener in &listeners {
            self.local.remove_listener(listener);
        }
    }

    /// Number of listeners currently bound through this channel.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
