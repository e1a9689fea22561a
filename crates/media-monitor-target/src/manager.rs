//! Media manager: discovery and connector ownership in the target context.
//!
//! The manager announces itself with `ready` and waits for the observer's
//! `ready`. The first acknowledgement switches it to ready and connects every
//! media element already in the document. Later acknowledgements mean the
//! observer was torn down and came back, so existing connectors only resend
//! their registration. Elements inserted or removed afterwards are picked up
//! from the document's structural change notifications.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError, Weak},
};

use media_monitor_core::{Channel, Endpoint, Envelope, Guid, Listener, Message, MonitorConfig};
use serde_json::Value;

use crate::connector::MediaConnector;
use crate::document::{MediaDocument, MutationCallback, MutationRecord};
use crate::element::MediaNode;

/// Native identity of an element: the address of its shared allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ElementKey(usize);

impl ElementKey {
    fn of(node: &MediaNode) -> Self {
        Self(Arc::as_ptr(node).cast::<()>().addr())
    }
}

#[derive(Default)]
struct State {
    ready: bool,
    connectors: HashMap<ElementKey, MediaConnector>,
}

struct Shared {
    config: MonitorConfig,
    document: Arc<dyn MediaDocument>,
    channel: Arc<Channel>,
    state: Mutex<State>,
    observer: Mutex<Option<MutationCallback>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_media(&self, node: &MediaNode) -> bool {
        self.config.is_media_tag(&node.tag_name())
    }

    fn on_message(&self, value: &Value) {
        let Ok(envelope) = Envelope::from_source(value, &self.config.observer_source) else {
            return;
        };
        if envelope.message != Message::Ready {
            return;
        }

        let mut state = self.state();
        if state.ready {
            tracing::debug!(
                connectors = state.connectors.len(),
                "observer reconnected, re-registering media"
            );
            for connector in state.connectors.values() {
                connector.register();
            }
            return;
        }

        state.ready = true;
        tracing::info!("observer ready, connecting media elements");
        for node in self.document.elements() {
            if self.is_media(&node) {
                self.add_element(&mut state, node);
            }
        }
    }

    fn on_mutations(&self, records: &[MutationRecord]) {
        let mut state = self.state();
        for record in records {
            for node in &record.added_nodes {
                if self.is_media(node) {
                    self.add_element(&mut state, Arc::clone(node));
                }
            }
            for node in &record.removed_nodes {
                if self.is_media(node) {
                    Self::remove_element(&mut state, node);
                }
            }
        }
    }

    fn add_element(&self, state: &mut State, node: MediaNode) {
        if !state.ready {
            return;
        }

        let key = ElementKey::of(&node);
        if state.connectors.contains_key(&key) {
            return;
        }

        let connector = MediaConnector::new(
            node,
            Arc::clone(&self.channel),
            &self.config.observer_source,
        );
        state.connectors.insert(key, connector);
    }

    fn remove_element(state: &mut State, node: &MediaNode) {
        if !state.ready {
            return;
        }

        if let Some(mut connector) = state.connectors.remove(&ElementKey::of(node)) {
            connector.destroy();
        }
    }
}

/// Owner of the discovery lifecycle and of every live connector.
pub struct MediaManager {
    shared: Arc<Shared>,
}

impl MediaManager {
    /// Create a manager for `document`, receiving on `local` and sending to `target`.
    #[must_use]
    pub fn new(
        config: MonitorConfig,
        document: Arc<dyn MediaDocument>,
        local: Arc<dyn Endpoint>,
        target: Arc<dyn Endpoint>,
    ) -> Self {
        let channel = Arc::new(Channel::new(config.target_source.clone(), local, target));
        Self {
            shared: Arc::new(Shared {
                config,
                document,
                channel,
                state: Mutex::new(State::default()),
                observer: Mutex::new(None),
            }),
        }
    }

    /// Start listening for the observer, announce readiness and watch the document.
    pub fn initialize(&self) {
        let weak = Arc::downgrade(&self.shared);
        let listener: Listener = Arc::new(move |value: &Value| {
            if let Some(shared) = weak.upgrade() {
                shared.on_message(value);
            }
        });
        self.shared.channel.add_listener(listener);
        self.shared.channel.ready();

        let callback = mutation_callback(Arc::downgrade(&self.shared));
        self.shared.document.observe(Arc::clone(&callback));
        *self
            .shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(callback);
    }

    /// Whether the observer handshake has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.shared.state().ready
    }

    /// Number of live connectors.
    #[must_use]
    pub fn connector_count(&self) -> usize {
        self.shared.state().connectors.len()
    }

    /// Identities of every live connector.
    #[must_use]
    pub fn guids(&self) -> Vec<Guid> {
        self.shared
            .state()
            .connectors
            .values()
            .map(|c| c.guid().clone())
            .collect()
    }

    /// Destroy every connector, the channel and the document observer.
    pub fn destroy(&self) {
        let connectors: Vec<MediaConnector> = {
            let mut state = self.shared.state();
            state.connectors.drain().map(|(_, c)| c).collect()
        };
        tracing::debug!(connectors = connectors.len(), "destroying media manager");

        for mut connector in connectors {
            connector.destroy();
        }

        self.shared.channel.destroy();

        let observer = self
            .shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(callback) = observer {
            self.shared.document.disconnect(&callback);
        }
    }
}

fn mutation_callback(weak: Weak<Shared>) -> MutationCallback {
    Arc::new(move |records: &[MutationRecord]| {
        if let Some(shared) = weak.upgrade() {
            shared.on_mutations(records);
        }
    })
}
