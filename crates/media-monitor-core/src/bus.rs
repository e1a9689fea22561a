//! In-memory endpoint with a delivery queue.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use futures::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::{Endpoint, Listener};

/// Message bus of one execution context.
///
/// `post` only enqueues and returns. Delivery happens later, either when the
/// host calls [`MessageBus::pump`] or from a task started with
/// [`MessageBus::spawn_dispatcher`]. Each message is handed to the listeners
/// bound at delivery time, in the order they were bound. Nothing is ordered
/// across buses.
pub struct MessageBus {
    name: String,
    listeners: RwLock<Vec<Listener>>,
    sender: mpsc::UnboundedSender<Value>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<Value>>>,
}

impl MessageBus {
    /// Create a new bus. The name is only used in logs.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            name: name.into(),
            listeners: RwLock::new(Vec::new()),
            sender,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Name used in log output.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deliver every queued message, including messages posted by listeners
    /// while pumping. Returns how many were delivered.
    ///
    /// Does nothing once a dispatcher task owns the queue.
    pub fn pump(&self) -> usize {
        let mut delivered = 0;
        loop {
            let next = {
                let mut receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
                match receiver.as_mut() {
                    Some(rx) => rx.try_recv().ok(),
                    None => None,
                }
            };
            let Some(message) = next else {
                break;
            };
            self.deliver(&message);
            delivered += 1;
        }
        delivered
    }

    /// Hand the queue to a background task that delivers as messages arrive.
    ///
    /// Returns `None` if a dispatcher is already running.
    pub fn spawn_dispatcher(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()?;

        let bus = Arc::downgrade(self);
        Some(tokio::spawn(async move {
            let mut stream = UnboundedReceiverStream::new(receiver);
            while let Some(message) = stream.next().await {
                let Some(bus) = bus.upgrade() else {
                    break;
                };
                bus.deliver(&message);
            }
        }))
    }

    /// Number of listeners currently bound.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn deliver(&self, message: &Value) {
        // Snapshot so listeners may bind or unbind while being called.
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        tracing::trace!(bus = %self.name, listeners = listeners.len(), "delivering message");
        for listener in &listeners {
            listener(message);
        }
    }
}

impl Endpoint for MessageBus {
    fn add_listener(&self, listener: Listener) {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn remove_listener(&self, listener: &Listener) {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = listeners.iter().position(|l| Arc::ptr_eq(l, listener)) {
            listeners.remove(index);
        }
    }

    fn post(&self, message: Value) {
        if self.sender.send(message).is_err() {
            tracing::trace!(bus = %self.name, "bus closed, message dropped");
        }
    }
}
