//! Target-side hop: moves traffic between a target page bus and the hub.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError, RwLock, Weak},
};

use media_monitor_core::{Endpoint, Listener, MonitorConfig, message::source_of};
use serde_json::Value;

use crate::hub::{RelayHub, TargetRouter};

/// Upward delivery from a target context into the relay.
pub trait RuntimeUplink: Send + Sync {
    fn send_from_target(&self, key: &str, message: Value);
}

impl RuntimeUplink for RelayHub {
    fn send_from_target(&self, key: &str, message: Value) {
        self.on_target_message(key, &message);
    }
}

/// Proxy living next to one target page.
///
/// Values on the page bus tagged with the target source go up; values from
/// the relay tagged with the observer source are posted onto the page bus.
/// Anything else is left alone in both directions.
pub struct TargetProxy {
    key: String,
    config: MonitorConfig,
    page: Arc<dyn Endpoint>,
    uplink: Weak<dyn RuntimeUplink>,
    listener: Mutex<Option<Listener>>,
}

impl TargetProxy {
    /// Create a proxy for the page identified by `key`. Call
    /// [`TargetProxy::attach`] to start forwarding page traffic.
    #[must_use]
    pub fn new(
        key: impl Into<String>,
        config: MonitorConfig,
        page: Arc<dyn Endpoint>,
        uplink: Weak<dyn RuntimeUplink>,
    ) -> Arc<Self> {
        Arc::new(Self {
            key: key.into(),
            config,
            page,
            uplink,
            listener: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bind the page bus listener. Calling it again is a no-op.
    pub fn attach(self: &Arc<Self>) {
        let mut slot = self.listener.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_some() {
            return;
        }

        let proxy = Arc::downgrade(self);
        let listener: Listener = Arc::new(move |value: &Value| {
            if let Some(proxy) = proxy.upgrade() {
                proxy.on_page_message(value);
            }
        });
        self.page.add_listener(Arc::clone(&listener));
        *slot = Some(listener);
    }

    /// Unbind from the page bus.
    pub fn detach(&self) {
        let listener = self
            .listener
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(listener) = listener {
            self.page.remove_listener(&listener);
        }
    }

    /// Handle a value delivered from the relay for this page.
    pub fn on_runtime_message(&self, message: &Value) {
        if source_of(message) == Some(self.config.observer_source.as_str()) {
            self.page.post(message.clone());
        }
    }

    fn on_page_message(&self, message: &Value) {
        if source_of(message) != Some(self.config.target_source.as_str()) {
            return;
        }

        match self.uplink.upgrade() {
            Some(uplink) => uplink.send_from_target(&self.key, message.clone()),
            None => tracing::trace!(key = %self.key, "relay gone, message dropped"),
        }
    }
}

/// In-process [`TargetRouter`]: proxies addressed by key.
#[derive(Default)]
pub struct TargetTable {
    proxies: RwLock<HashMap<String, Arc<TargetProxy>>>,
}

impl TargetTable {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Route values for the proxy's key to it, replacing any previous proxy.
    pub fn insert(&self, proxy: Arc<TargetProxy>) {
        self.proxies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(proxy.key().to_string(), proxy);
    }

    pub fn remove(&self, key: &str) -> Option<Arc<TargetProxy>> {
        self.proxies
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.proxies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TargetRouter for TargetTable {
    fn send_to_target(&self, key: &str, message: Value) {
        let proxy = self
            .proxies
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        match proxy {
            Some(proxy) => proxy.on_runtime_message(&message),
            None => tracing::trace!(%key, "no target with key, dropping"),
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
    struct RecordingUplink {
        sent: Mutex<Vec<(String, Value)>>,
    }

    impl RuntimeUplink for RecordingUplink {
        fn send_from_target(&self, key: &str, message: Value) {
            self.sent.lock().unwrap().push((key.to_string(), message));
        }
    }

    fn proxy() -> (Arc<TargetProxy>, Arc<MessageBus>, Arc<RecordingUplink>) {
        let page = MessageBus::new("page");
        let uplink = Arc::new(RecordingUplink::default());
        let weak: Weak<RecordingUplink> = Arc::downgrade(&uplink);
        let weak: Weak<dyn RuntimeUplink> = weak;
        let proxy = TargetProxy::new("7", MonitorConfig::default(), page.clone(), weak);
        proxy.attach();
        (proxy, page, uplink)
    }

    #[test]
    fn test_page_traffic_goes_up_filtered() {
        let (_proxy, page, uplink) = proxy();

        let register = json!({"action": "unregister", "guid": "g", "src": "mm-content-script"});
        page.post(register.clone());
        page.post(json!({"action": "ready", "src": "mm-devtools"}));
        page.post(json!({"hello": "world"}));
        page.pump();

        let sent = uplink.sent.lock().unwrap();
        assert_eq!(sent.as_slice(), &[("7".to_string(), register)]);
    }

    #[test]
    fn test_relay_traffic_goes_down_filtered() {
        let (proxy, page, _) = proxy();
        let recorder = Recorder::attach(page.as_ref());

        let ready = json!({"action": "ready", "src": "mm-devtools", "tabId": "7"});
        proxy.on_runtime_message(&ready);
        proxy.on_runtime_message(&json!({"action": "ready", "src": "mm-content-script"}));
        page.pump();

        assert_eq!(recorder.take(), vec![ready]);
    }

    #[test]
    fn test_attach_twice_binds_once() {
        let (proxy, page, _) = proxy();
        proxy.attach();
        assert_eq!(page.listener_count(), 1);

        proxy.detach();
        assert_eq!(page.listener_count(), 0);
    }

    #[test]
    fn test_dropped_uplink_is_tolerated() {
        let (_proxy, page, uplink) = proxy();
        drop(uplink);

        page.post(json!({"action": "ready", "src": "mm-content-script"}));
        assert_eq!(page.pump(), 1);
    }

    #[test]
    fn test_table_routes_by_key() {
        let (proxy, page, _) = proxy();
        let table = TargetTable::new();
        table.insert(proxy);
        let recorder = Recorder::attach(page.as_ref());

        let ready = json!({"action": "ready", "src": "mm-devtools", "tabId": "7"});
        table.send_to_target("7", ready.clone());
        table.send_to_target("8", ready.clone());
        page.pump();

        assert_eq!(recorder.take(), vec![ready]);
        assert!(table.remove("7").is_some());
        assert!(table.is_empty());
    }
}
