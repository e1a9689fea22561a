//! Observer-side hop: connects the panel bus to the hub for one target key.

use std::sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicBool, Ordering},
};

use media_monitor_core::{
    Endpoint, Envelope, Listener, Message, MonitorConfig,
    message::{relay_init, source_of, with_key},
};
use serde_json::Value;

use crate::{
    hub::RelayHub,
    port::{CallbackPort, Port},
};

/// Upward connection from an observer to the hub.
pub trait HubLink: Send + Sync {
    fn post(&self, message: Value);

    /// Tell the hub this connection is gone.
    fn close(&self);
}

/// [`HubLink`] to a hub in the same process.
pub struct LocalHubLink {
    hub: Weak<RelayHub>,
    port: Arc<dyn Port>,
}

impl LocalHubLink {
    #[must_use]
    pub fn new(hub: &Arc<RelayHub>, port: Arc<dyn Port>) -> Self {
        Self {
            hub: Arc::downgrade(hub),
            port,
        }
    }
}

impl HubLink for LocalHubLink {
    fn post(&self, message: Value) {
        if let Some(hub) = self.hub.upgrade() {
            hub.on_port_message(&self.port, &message);
        }
    }

    fn close(&self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.on_disconnect(self.port.id());
        }
    }
}

/// Bridge between the observer panel and the relay hub.
///
/// On connect it announces its key to the hub. Panel traffic is only
/// relayed once the panel has been shown, and from then on in both
/// directions: observer-tagged panel values go up stamped with the key,
/// target-tagged hub values go down onto the panel bus.
pub struct ObserverBridge {
    key: String,
    config: MonitorConfig,
    panel: Arc<dyn Endpoint>,
    link: Mutex<Option<Arc<dyn HubLink>>>,
    shown: AtomicBool,
    panel_listener: Mutex<Option<Listener>>,
}

impl ObserverBridge {
    #[must_use]
    pub fn new(key: impl Into<String>, config: MonitorConfig, panel: Arc<dyn Endpoint>) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            config,
            panel,
            link: Mutex::new(None),
            shown: AtomicBool::new(false),
            panel_listener: Mutex::new(None),
        })
    }

    /// Create a bridge and connect it to an in-process hub.
    #[must_use]
    pub fn connect_local(
        key: impl Into<String>,
        config: MonitorConfig,
        panel: Arc<dyn Endpoint>,
        hub: &Arc<RelayHub>,
    ) -> Arc<Self> {
        let bridge = Self::new(key, config, panel);

        let weak = Arc::downgrade(&bridge);
        let port = CallbackPort::new(Arc::new(move |value: &Value| {
            if let Some(bridge) = weak.upgrade() {
                bridge.on_hub_message(value);
            }
        }));
        bridge.connect(Arc::new(LocalHubLink::new(hub, port)));
        bridge
    }

    /// Relay key of the inspected target.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Whether the panel has been shown and relaying started.
    #[must_use]
    pub fn is_shown(&self) -> bool {
        self.shown.load(Ordering::SeqCst)
    }

    /// Attach the upward link and announce this bridge's key.
    pub fn connect(&self, link: Arc<dyn HubLink>) {
        link.post(relay_init(&self.config.relay_init, &self.key));
        *self.link.lock().unwrap_or_else(PoisonError::into_inner) = Some(link);
    }

    /// First display of the panel. Starts relaying and sends `ready` on the
    /// panel's behalf. Later calls do nothing.
    pub fn on_panel_shown(self: &Arc<Self>) {
        if self.shown.swap(true, Ordering::SeqCst) {
            return;
        }

        let bridge = Arc::downgrade(self);
        let listener: Listener = Arc::new(move |value: &Value| {
            if let Some(bridge) = bridge.upgrade() {
                bridge.on_panel_message(value);
            }
        });
        self.panel.add_listener(Arc::clone(&listener));
        *self
            .panel_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(listener);

        match Envelope::new(self.config.observer_source.as_str(), Message::Ready)
            .with_key(self.key.as_str())
            .to_value()
        {
            Ok(ready) => self.post_up(ready),
            Err(e) => tracing::error!("Failed to serialize message: {e}"),
        }
        tracing::debug!(key = %self.key, "panel shown, relaying");
    }

    /// Handle a value delivered by the hub.
    pub fn on_hub_message(&self, message: &Value) {
        if !self.is_shown() {
            tracing::trace!(key = %self.key, "panel not shown, dropping");
            return;
        }
        if source_of(message) == Some(self.config.target_source.as_str()) {
            self.panel.post(message.clone());
        }
    }

    /// Drop the hub connection and stop listening on the panel.
    pub fn disconnect(&self) {
        let listener = self
            .panel_listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            self.panel.remove_listener(&listener);
        }

        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(link) = link {
            link.close();
        }
    }

    fn on_panel_message(&self, message: &Value) {
        if source_of(message) == Some(self.config.observer_source.as_str()) {
            self.post_up(with_key(message, &self.key));
        }
    }

    fn post_up(&self, message: Value) {
        let link = self.link.lock().unwrap_or_else(PoisonError::into_inner).clone();
        match link {
            Some(link) => link.post(message),
            None => tracing::trace!(key = %self.key, "not connected, dropping"),
        }
    }
}

#[cfg(test)]
mod tests {
    use media_monitor_core::MessageBus;
    use media_monitor_target::testing::Recorder;
    use serde_json::json;

    use super::*;

    #[derive(Default)]
    struct RecordingLink {
        sent: Mutex<Vec<Value>>,
        closed: AtomicBool,
    }

    impl RecordingLink {
        fn take(&self) -> Vec<Value> {
            std::mem::take(&mut *self.sent.lock().unwrap())
        }
    }

    impl HubLink for RecordingLink {
        fn post(&self, message: Value) {
            self.sent.lock().unwrap().push(message);
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn bridge() -> (Arc<ObserverBridge>, Arc<MessageBus>, Arc<RecordingLink>) {
        let panel = MessageBus::new("panel");
        let link = Arc::new(RecordingLink::default());
        let bridge = ObserverBridge::new("7", MonitorConfig::default(), panel.clone());
        bridge.connect(link.clone());
        (bridge, panel, link)
    }

    #[test]
    fn test_connect_announces_key() {
        let (_bridge, _panel, link) = bridge();
        assert_eq!(link.take(), vec![json!({"name": "mm-init", "tabId": "7"})]);
    }

    #[test]
    fn test_nothing_relayed_before_shown() {
        let (bridge, panel, link) = bridge();
        let recorder = Recorder::attach(panel.as_ref());
        link.take();

        panel.post(json!({"action": "ready", "src": "mm-devtools"}));
        panel.pump();
        bridge.on_hub_message(&json!({"action": "ready", "src": "mm-content-script"}));
        panel.pump();

        assert!(link.take().is_empty());
        assert_eq!(recorder.take().len(), 1);
    }

    #[test]
    fn test_shown_sends_ready_with_key_once() {
        let (bridge, panel, link) = bridge();
        link.take();

        bridge.on_panel_shown();
        bridge.on_panel_shown();

        assert_eq!(
            link.take(),
            vec![json!({"action": "ready", "src": "mm-devtools", "tabId": "7"})]
        );
        assert_eq!(panel.listener_count(), 1);
    }

    #[test]
    fn test_panel_traffic_stamped_and_filtered() {
        let (bridge, panel, link) = bridge();
        bridge.on_panel_shown();
        link.take();

        panel.post(json!({"action": "mediaEvent", "guid": "g", "name": "pause", "src": "mm-devtools"}));
        panel.post(json!({"action": "ready", "src": "mm-content-script"}));
        panel.pump();

        assert_eq!(
            link.take(),
            vec![json!({
                "action": "mediaEvent",
                "guid": "g",
                "name": "pause",
                "src": "mm-devtools",
                "tabId": "7"
            })]
        );
    }

    #[test]
    fn test_hub_traffic_reaches_panel_filtered() {
        let (bridge, panel, _) = bridge();
        bridge.on_panel_shown();
        let recorder = Recorder::attach(panel.as_ref());

        let unregister = json!({"action": "unregister", "guid": "g", "src": "mm-content-script"});
        bridge.on_hub_message(&unregister);
        bridge.on_hub_message(&json!({"action": "ready", "src": "mm-devtools"}));
        panel.pump();

        assert_eq!(recorder.take(), vec![unregister]);
    }

    #[test]
    fn test_disconnect_closes_link_and_unbinds() {
        let (bridge, panel, link) = bridge();
        bridge.on_panel_shown();

        bridge.disconnect();

        assert!(link.closed.load(Ordering::SeqCst));
        assert_eq!(panel.listener_count(), 0);
    }
}
