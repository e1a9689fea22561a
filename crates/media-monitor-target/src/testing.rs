//! In-memory fakes of the native media API.
//!
//! Events are injected with [`FakeMediaElement::dispatch`] and structural
//! changes are delivered in batches with [`FakeDocument::flush`], so tests
//! decide exactly when each callback runs.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use media_monitor_core::{Endpoint, Listener, TextTrackInfo, TextTrackPatch};
use serde_json::Value;

use crate::document::{MediaDocument, MutationCallback, MutationRecord};
use crate::element::{EventHandler, MediaElement, MediaEventKind, MediaNode, MediaProperties};

#[derive(Default)]
struct ElementState {
    properties: MediaProperties,
    text_tracks: Vec<TextTrackInfo>,
    listeners: Vec<(MediaEventKind, EventHandler)>,
    text_tracks_listeners: Vec<EventHandler>,
    removed: Vec<MediaEventKind>,
    commands: usize,
}

/// Scriptable media element.
pub struct FakeMediaElement {
    tag_name: String,
    id: String,
    class_name: String,
    state: Mutex<ElementState>,
}

impl FakeMediaElement {
    /// Create an element in the state a freshly inserted, unloaded one has.
    #[must_use]
    pub fn new(tag_name: &str) -> Self {
        let properties = MediaProperties {
            duration: f64::NAN,
            paused: true,
            playback_rate: 1.0,
            preload: "auto".to_string(),
            volume: 1.0,
            ..MediaProperties::default()
        };

        Self {
            tag_name: tag_name.to_uppercase(),
            id: String::new(),
            class_name: String::new(),
            state: Mutex::new(ElementState {
                properties,
                ..ElementState::default()
            }),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    #[must_use]
    pub fn with_class(mut self, class_name: &str) -> Self {
        self.class_name = class_name.to_string();
        self
    }

    #[must_use]
    pub fn with_properties(self, f: impl FnOnce(&mut MediaProperties)) -> Self {
        self.update(f);
        self
    }

    /// Change attributes without firing any event.
    pub fn update(&self, f: impl FnOnce(&mut MediaProperties)) {
        f(&mut self.state().properties);
    }

    pub fn set_text_tracks(&self, tracks: Vec<TextTrackInfo>) {
        self.state().text_tracks = tracks;
    }

    /// Fire a native event at every handler bound for it.
    pub fn dispatch(&self, kind: MediaEventKind) {
        let handlers: Vec<EventHandler> = self
            .state()
            .listeners
            .iter()
            .filter(|(k, _)| *k == kind)
            .map(|(_, h)| Arc::clone(h))
            .collect();

        for handler in handlers {
            handler();
        }
    }

    /// Fire the text track list `change` event.
    pub fn dispatch_text_tracks_change(&self) {
        let handlers = self.state().text_tracks_listeners.clone();
        for handler in handlers {
            handler();
        }
    }

    #[must_use]
    pub fn listener_count(&self, kind: MediaEventKind) -> usize {
        self.state()
            .listeners
            .iter()
            .filter(|(k, _)| *k == kind)
            .count()
    }

    #[must_use]
    pub fn total_listener_count(&self) -> usize {
        let state = self.state();
        state.listeners.len() + state.text_tracks_listeners.len()
    }

    #[must_use]
    pub fn text_tracks_listener_count(&self) -> usize {
        self.state().text_tracks_listeners.len()
    }

    /// Every event kind passed to a successful `remove_event_listener`, in order.
    #[must_use]
    pub fn removed_events(&self) -> Vec<MediaEventKind> {
        self.state().removed.clone()
    }

    /// How many remote commands reached this element.
    #[must_use]
    pub fn commands_applied(&self) -> usize {
        self.state().commands
    }

    fn state(&self) -> MutexGuard<'_, ElementState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn command(&self, f: impl FnOnce(&mut ElementState)) {
        let mut state = self.state();
        state.commands += 1;
        f(&mut state);
    }
}

impl MediaElement for FakeMediaElement {
    fn tag_name(&self) -> String {
        self.tag_name.clone()
    }

    fn id(&self) -> String {
        self.id.clone()
    }

    fn class_name(&self) -> String {
        self.class_name.clone()
    }

    fn properties(&self) -> MediaProperties {
        self.state().properties.clone()
    }

    fn text_tracks(&self) -> Vec<TextTrackInfo> {
        self.state().text_tracks.clone()
    }

    fn add_event_listener(&self, kind: MediaEventKind, handler: EventHandler) {
        self.state().listeners.push((kind, handler));
    }

    fn remove_event_listener(&self, kind: MediaEventKind, handler: &EventHandler) {
        let mut state = self.state();
        if let Some(index) = state
            .listeners
            .iter()
            .position(|(k, h)| *k == kind && Arc::ptr_eq(h, handler))
        {
            state.listeners.remove(index);
            state.removed.push(kind);
        }
    }

    fn add_text_tracks_listener(&self, handler: EventHandler) {
        self.state().text_tracks_listeners.push(handler);
    }

    fn remove_text_tracks_listener(&self, handler: &EventHandler) {
        self.state()
            .text_tracks_listeners
            .retain(|h| !Arc::ptr_eq(h, handler));
    }

    fn play(&self) {
        self.command(|s| s.properties.paused = false);
    }

    fn pause(&self) {
        self.command(|s| s.properties.paused = true);
    }

    fn set_current_time(&self, time: f64) {
        self.command(|s| s.properties.current_time = time);
    }

    fn set_loop(&self, looping: bool) {
        self.command(|s| s.properties.looping = looping);
    }

    fn set_muted(&self, muted: bool) {
        self.command(|s| s.properties.muted = muted);
    }

    fn set_playback_rate(&self, rate: f64) {
        self.command(|s| s.properties.playback_rate = rate);
    }

    fn set_volume(&self, volume: f64) {
        self.command(|s| s.properties.volume = volume);
    }

    fn set_text_track(&self, patch: &TextTrackPatch) {
        self.command(|s| {
            let Some(track) = s.text_tracks.get_mut(patch.index) else {
                return;
            };
            if let Some(id) = &patch.id {
                track.id.clone_from(id);
            }
            if let Some(kind) = &patch.kind {
                track.kind.clone_from(kind);
            }
            if let Some(label) = &patch.label {
                track.label.clone_from(label);
            }
            if let Some(language) = &patch.language {
                track.language.clone_from(language);
            }
            if let Some(mode) = patch.mode {
                track.mode = mode;
            }
        });
    }
}

#[derive(Default)]
struct DocumentState {
    elements: Vec<MediaNode>,
    observers: Vec<MutationCallback>,
    pending: Vec<MutationRecord>,
}

/// Document whose structural changes are queued until [`FakeDocument::flush`].
#[derive(Default)]
pub struct FakeDocument {
    state: Mutex<DocumentState>,
}

impl FakeDocument {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Insert a node and queue the matching change record.
    pub fn append(&self, node: MediaNode) {
        let mut state = self.state();
        state.elements.push(Arc::clone(&node));
        state.pending.push(MutationRecord {
            added_nodes: vec![node],
            removed_nodes: Vec::new(),
        });
    }

    /// Detach a node and queue the matching change record. Unknown nodes are ignored.
    pub fn remove(&self, node: &MediaNode) {
        let mut state = self.state();
        let Some(index) = state.elements.iter().position(|n| Arc::ptr_eq(n, node)) else {
            return;
        };
        let node = state.elements.remove(index);
        state.pending.push(MutationRecord {
            added_nodes: Vec::new(),
            removed_nodes: vec![node],
        });
    }

    /// Deliver every queued record as one batch. Returns the batch size.
    pub fn flush(&self) -> usize {
        let (records, observers) = {
            let mut state = self.state();
            (std::mem::take(&mut state.pending), state.observers.clone())
        };

        if !records.is_empty() {
            for observer in &observers {
                observer(&records);
            }
        }
        records.len()
    }

    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.state().observers.len()
    }

    fn state(&self) -> MutexGuard<'_, DocumentState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaDocument for FakeDocument {
    fn elements(&self) -> Vec<MediaNode> {
        self.state().elements.clone()
    }

    fn observe(&self, callback: MutationCallback) {
        self.state().observers.push(callback);
    }

    fn disconnect(&self, callback: &MutationCallback) {
        self.state()
            .observers
            .retain(|c| !Arc::ptr_eq(c, callback));
    }
}

/// Listener that keeps every value delivered to it.
#[derive(Clone, Default)]
pub struct Recorder {
    seen: Arc<Mutex<Vec<Value>>>,
}

impl Recorder {
    /// Create a recorder and bind it to `endpoint`.
    #[must_use]
    pub fn attach(endpoint: &dyn Endpoint) -> Self {
        let recorder = Self::default();
        endpoint.add_listener(recorder.listener());
        recorder
    }

    #[must_use]
    pub fn listener(&self) -> Listener {
        let seen = Arc::clone(&self.seen);
        Arc::new(move |value: &Value| {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(value.clone());
        })
    }

    /// Drain everything recorded so far.
    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.seen.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
