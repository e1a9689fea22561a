//! Observer-side mirror: projects relayed traffic into local state.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use media_monitor_core::{
    Channel, Command, Endpoint, Envelope, EventPayload, Guid, Listener, MediaSnapshot, Message,
    MonitorConfig,
};
use serde_json::Value;

use crate::state::{ElementEntry, LoggedEvent, MediaState};

#[derive(Default)]
struct State {
    elements: Vec<ElementEntry>,
    media: HashMap<Guid, MediaState>,
    current: Option<Guid>,
}

impl State {
    fn register(&mut self, guid: Guid, selector: String, snapshot: MediaSnapshot) {
        if self.media.contains_key(&guid) {
            tracing::trace!(%guid, "already mirrored, ignoring registration");
            return;
        }

        tracing::debug!(%guid, %selector, "mirroring media element");
        if self.current.is_none() {
            self.current = Some(guid.clone());
        }
        self.elements.push(ElementEntry {
            guid: guid.clone(),
            selector,
        });
        self.media.insert(guid, MediaState::from_snapshot(snapshot));
    }

    fn unregister(&mut self, guid: &Guid) {
        self.elements.retain(|e| &e.guid != guid);
        if self.media.remove(guid).is_some() {
            tracing::debug!(%guid, "media element gone");
        }

        if self.current.as_ref() == Some(guid) {
            self.current = self.elements.first().map(|e| e.guid.clone());
        }
    }
}

struct Shared {
    config: MonitorConfig,
    channel: Channel,
    state: Mutex<State>,
    listener: Mutex<Option<Listener>>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn on_message(&self, value: &Value) {
        let envelope = match Envelope::from_source(value, &self.config.target_source) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::trace!("ignoring message: {e}");
                return;
            }
        };

        match envelope.message {
            // The target announced itself after we did; answer so it starts registering.
            Message::Ready => self.channel.ready(),
            Message::Register {
                guid,
                selector,
                value,
            } => self.state().register(guid, selector, value),
            Message::Unregister { guid } => self.state().unregister(&guid),
            Message::MediaEvent { guid, name, value } => {
                let mut state = self.state();
                match state.media.get_mut(&guid) {
                    Some(media) => {
                        media.apply_event(&name, EventPayload::from_value(&value));
                    }
                    None => tracing::trace!(%guid, %name, "event for unknown element"),
                }
            }
        }
    }
}

/// Local projection of every media element reported by one target.
pub struct Mirror {
    shared: Arc<Shared>,
}

impl Mirror {
    /// Create a mirror receiving on `local` and sending to `target`.
    #[must_use]
    pub fn new(config: MonitorConfig, local: Arc<dyn Endpoint>, target: Arc<dyn Endpoint>) -> Self {
        let channel = Channel::new(config.observer_source.clone(), local, target);
        Self {
            shared: Arc::new(Shared {
                config,
                channel,
                state: Mutex::new(State::default()),
                listener: Mutex::new(None),
            }),
        }
    }

    /// Start listening and announce readiness.
    pub fn initialize(&self) {
        let mut slot = self
            .shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let weak = Arc::downgrade(&self.shared);
        let listener: Listener = Arc::new(move |value: &Value| {
            if let Some(shared) = weak.upgrade() {
                shared.on_message(value);
            }
        });
        self.shared.channel.add_listener(Arc::clone(&listener));
        *slot = Some(listener);
        drop(slot);

        self.shared.channel.ready();
    }

    /// Elements in registration order.
    #[must_use]
    pub fn elements(&self) -> Vec<ElementEntry> {
        self.shared.state().elements.clone()
    }

    #[must_use]
    pub fn element_count(&self) -> usize {
        self.shared.state().elements.len()
    }

    /// Currently selected element, if any.
    #[must_use]
    pub fn current(&self) -> Option<Guid> {
        self.shared.state().current.clone()
    }

    /// Select a mirrored element. Returns false if it is not known.
    pub fn select(&self, guid: &Guid) -> bool {
        let mut state = self.shared.state();
        if !state.media.contains_key(guid) {
            return false;
        }
        state.current = Some(guid.clone());
        true
    }

    /// Copy of the mirrored state of one element.
    #[must_use]
    pub fn media(&self, guid: &Guid) -> Option<MediaState> {
        self.shared.state().media.get(guid).cloned()
    }

    /// Event log of one element, oldest first.
    #[must_use]
    pub fn events(&self, guid: &Guid) -> Vec<LoggedEvent> {
        self.shared
            .state()
            .media
            .get(guid)
            .map(|m| m.events.clone())
            .unwrap_or_default()
    }

    pub fn clear_events(&self, guid: &Guid) {
        if let Some(media) = self.shared.state().media.get_mut(guid) {
            media.clear_events();
        }
    }

    /// Ask the remote element to apply `command`.
    ///
    /// Fire-and-forget: the element's own events will report the outcome.
    pub fn send_command(&self, guid: &Guid, command: &Command) {
        tracing::debug!(%guid, command = command.name(), "sending command");
        self.shared.channel.send(Message::MediaEvent {
            guid: guid.clone(),
            name: command.name().to_string(),
            value: command.value(),
        });
    }

    /// Send `command` to the current element. Returns false if none is selected.
    pub fn send_to_current(&self, command: &Command) -> bool {
        let Some(guid) = self.current() else {
            return false;
        };
        self.send_command(&guid, command);
        true
    }

    /// Stop listening. Mirrored state is kept.
    pub fn destroy(&self) {
        self.shared
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.shared.channel.destroy();
    }
}
