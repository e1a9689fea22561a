//! Monitor configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Source tag of the observer (devtools panel) side.
pub const OBSERVER_SOURCE: &str = "mm-devtools";

/// Source tag of the target (content script) side.
pub const TARGET_SOURCE: &str = "mm-content-script";

/// Name of the one-time message that opens a relay session.
pub const RELAY_INIT: &str = "mm-init";

/// Settings shared by every context of one monitor deployment.
///
/// Both sides must agree on the source tags, otherwise every message is
/// treated as foreign traffic and silently dropped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Tag carried by messages authored on the observer side.
    pub observer_source: String,
    /// Tag carried by messages authored on the target side.
    pub target_source: String,
    /// `name` of the relay session announcement.
    pub relay_init: String,
    /// Tag names (upper case) of the resources worth monitoring.
    pub media_tags: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            observer_source: OBSERVER_SOURCE.to_string(),
            target_source: TARGET_SOURCE.to_string(),
            relay_init: RELAY_INIT.to_string(),
            media_tags: vec!["AUDIO".to_string(), "VIDEO".to_string()],
        }
    }
}

impl MonitorConfig {
    /// Load a configuration from a JSON file. Missing keys keep their defaults.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or is not valid JSON.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Parse a configuration from a JSON string.
    ///
    /// # Errors
    /// Returns error if the string is not valid JSON.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Whether a node with this tag name is a monitored resource.
    #[must_use]
    pub fn is_media_tag(&self, tag_name: &str) -> bool {
        self.media_tags
            .iter()
            .any(|tag| tag.eq_ignore_ascii_case(tag_name))
    }
}
