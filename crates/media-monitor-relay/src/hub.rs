//! Relay hub: routes between observer connections and target contexts.
//!
//! The hub keeps one routing entry per target key, pointing at the observer
//! connection that announced itself for that key. It holds no resource state.

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use media_monitor_core::{
    MonitorConfig,
    message::{key_of, source_of},
};
use serde_json::Value;

use crate::port::{Port, PortId};

/// Delivery into target contexts, addressed by key.
pub trait TargetRouter: Send + Sync {
    fn send_to_target(&self, key: &str, message: Value);
}

/// Session router between observers and targets.
pub struct RelayHub {
    config: MonitorConfig,
    sessions: RwLock<HashMap<String, Arc<dyn Port>>>,
    targets: Arc<dyn TargetRouter>,
}

impl RelayHub {
    /// Create a new hub delivering target-bound traffic through `targets`.
    #[must_use]
    pub fn new(config: MonitorConfig, targets: Arc<dyn TargetRouter>) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            targets,
        }
    }

    /// Handle a value arriving on an observer connection.
    ///
    /// A relay init opens (or takes over) the session for its key. Observer
    /// traffic is forwarded verbatim to the target named by its key, provided
    /// a session exists for it. Everything else is dropped.
    pub fn on_port_message(&self, port: &Arc<dyn Port>, message: &Value) {
        if self.is_relay_init(message) {
            if let Some(key) = key_of(message) {
                tracing::debug!(%key, port = %port.id(), "relay session opened");
                self.sessions
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(key, Arc::clone(port));
            }
            return;
        }

        if source_of(message) != Some(self.config.observer_source.as_str()) {
            tracing::trace!(port = %port.id(), "dropping foreign message");
            return;
        }

        let Some(key) = key_of(message) else {
            tracing::trace!(port = %port.id(), "dropping message without key");
            return;
        };

        if self.has_session(&key) {
            self.targets.send_to_target(&key, message.clone());
        } else {
            tracing::trace!(%key, "no session for key, dropping");
        }
    }

    /// Handle a value coming up from the target context with `key`.
    pub fn on_target_message(&self, key: &str, message: &Value) {
        let port = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();

        match port {
            Some(port) => port.post(message.clone()),
            None => tracing::trace!(%key, "no observer for target, dropping"),
        }
    }

    /// Forget every session served by the disconnected connection.
    ///
    /// Scans all sessions; the key is not needed and may never have been seen.
    pub fn on_disconnect(&self, port_id: PortId) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|_, port| port.id() != port_id);

        if sessions.len() != before {
            tracing::debug!(port = %port_id, "relay session closed");
        }
    }

    #[must_use]
    pub fn has_session(&self, key: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn is_relay_init(&self, message: &Value) -> bool {
        message.get("name").and_then(Value::as_str) == Some(self.config.relay_init.as_str())
    }
}
