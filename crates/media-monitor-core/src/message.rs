//! Wire protocol spoken at every hop.
//!
//! Buses carry raw JSON because they are shared with unrelated traffic.
//! Every monitor message is an object `{ action, src, ...payload }`; relay hops
//! add a `tabId` routing key. Anything that does not parse as an [`Envelope`]
//! is foreign and gets dropped by the receiver.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{DecodeError, Guid, RangePairs};

/// Field carrying the message source tag.
pub const SOURCE_FIELD: &str = "src";

/// Field carrying the relay routing key.
pub const KEY_FIELD: &str = "tabId";

/// Synthetic event name for text track list changes.
pub const TEXT_TRACKS_CHANGE: &str = "mm_texttrackschange";

/// Monitor message body, tagged by `action`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Message {
    /// Handshake announcement, sent by both sides.
    Ready,
    /// A resource came into view, with its full attribute snapshot.
    Register {
        guid: Guid,
        selector: String,
        value: MediaSnapshot,
    },
    /// A resource went away.
    Unregister { guid: Guid },
    /// Native event (outbound) or remote command (inbound) for one resource.
    MediaEvent {
        guid: Guid,
        name: String,
        #[serde(default)]
        value: Value,
    },
}

impl Message {
    /// Identity of the resource this message is about, if any.
    #[must_use]
    pub const fn guid(&self) -> Option<&Guid> {
        match self {
            Self::Ready => None,
            Self::Register { guid, .. }
            | Self::Unregister { guid }
            | Self::MediaEvent { guid, .. } => Some(guid),
        }
    }
}

/// A decoded message together with its source tag and optional routing key.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub src: String,
    pub key: Option<String>,
    pub message: Message,
}

impl Envelope {
    #[must_use]
    pub fn new(src: impl Into<String>, message: Message) -> Self {
        Self {
            src: src.into(),
            key: None,
            message,
        }
    }

    /// Attach a relay routing key.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Encode for posting on a bus.
    ///
    /// # Errors
    /// Returns error if the payload cannot be represented as JSON.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.message)?;
        if let Value::Object(map) = &mut value {
            map.insert(SOURCE_FIELD.to_string(), Value::String(self.src.clone()));
            if let Some(key) = &self.key {
                map.insert(KEY_FIELD.to_string(), Value::String(key.clone()));
            }
        }
        Ok(value)
    }

    /// Decode a raw bus value.
    ///
    /// # Errors
    /// Returns error if the value has no source tag or no valid monitor body.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        let src = source_of(value).ok_or(DecodeError::MissingSource)?;
        let message = Message::deserialize(value)?;
        Ok(Self {
            src: src.to_string(),
            key: key_of(value),
            message,
        })
    }

    /// Decode a raw bus value, accepting only the given source tag.
    ///
    /// # Errors
    /// Returns error if the value is malformed or was authored by another source.
    pub fn from_source(value: &Value, expected: &str) -> Result<Self, DecodeError> {
        match source_of(value) {
            None => Err(DecodeError::MissingSource),
            Some(src) if src != expected => Err(DecodeError::ForeignSource(src.to_string())),
            Some(_) => Self::from_value(value),
        }
    }
}

/// Source tag of a raw bus value.
#[must_use]
pub fn source_of(value: &Value) -> Option<&str> {
    value.get(SOURCE_FIELD)?.as_str()
}

/// Relay routing key of a raw bus value. Numeric keys are accepted too.
#[must_use]
pub fn key_of(value: &Value) -> Option<String> {
    match value.get(KEY_FIELD)? {
        Value::String(key) => Some(key.clone()),
        Value::Number(key) => Some(key.to_string()),
        _ => None,
    }
}

/// Copy of a raw bus value with the relay routing key set.
#[must_use]
pub fn with_key(value: &Value, key: &str) -> Value {
    let mut value = value.clone();
    if let Value::Object(map) = &mut value {
        map.insert(KEY_FIELD.to_string(), Value::String(key.to_string()));
    }
    value
}

/// One-time relay session announcement: `{ name, tabId }`.
#[must_use]
pub fn relay_init(name: &str, key: &str) -> Value {
    let mut map = Map::new();
    map.insert("name".to_string(), Value::String(name.to_string()));
    map.insert(KEY_FIELD.to_string(), Value::String(key.to_string()));
    Value::Object(map)
}

/// Resource error as seen over the wire.
///
/// Standard codes (below 4) travel as integers; anything else travels as the
/// resource's own description so extended conditions stay readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorValue {
    Code(u16),
    Message(String),
}

impl ErrorValue {
    const DESCRIBED_FROM: u16 = 4;

    #[must_use]
    pub fn from_native(code: u16, message: &str) -> Self {
        if code < Self::DESCRIBED_FROM {
            Self::Code(code)
        } else {
            Self::Message(message.to_string())
        }
    }
}

/// Text track display mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextTrackMode {
    #[default]
    Disabled,
    Hidden,
    Showing,
}

/// Descriptor of one text track.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTrackInfo {
    pub id: String,
    pub kind: String,
    pub label: String,
    pub language: String,
    pub mode: TextTrackMode,
}

/// Full attribute snapshot sent with `register`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaSnapshot {
    pub autoplay: bool,
    pub controls: bool,
    pub cross_origin: Option<String>,
    pub current_src: String,
    #[serde(deserialize_with = "nan_if_null")]
    pub current_time: f64,
    #[serde(deserialize_with = "nan_if_null")]
    pub duration: f64,
    pub ended: bool,
    pub error: Option<ErrorValue>,
    pub height: u32,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub muted: bool,
    pub network_state: u8,
    pub paused: bool,
    #[serde(deserialize_with = "nan_if_null")]
    pub playback_rate: f64,
    pub poster: String,
    pub preload: String,
    pub ready_state: u8,
    pub seeking: bool,
    pub src: String,
    pub video_height: u32,
    pub video_width: u32,
    #[serde(deserialize_with = "nan_if_null")]
    pub volume: f64,
    pub width: u32,
    pub buffered: RangePairs,
    pub seekable: RangePairs,
    pub played: RangePairs,
    pub text_tracks: Vec<TextTrackInfo>,
}

/// Attribute bag of an outbound `mediaEvent`.
///
/// Only the fields relevant to the event are set, except `buffered` and
/// `seekable`, which resources always attach.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub playback_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub played: Option<RangePairs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_tracks: Option<Vec<TextTrackInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffered: Option<RangePairs>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seekable: Option<RangePairs>,
}

impl EventPayload {
    /// Decode an event value; anything unreadable yields an empty bag.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        Self::deserialize(value).unwrap_or_default()
    }

    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

// Non-finite numbers are written as `null` by serde_json.
fn nan_if_null<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
