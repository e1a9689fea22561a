//! Remote commands accepted by a monitored resource.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{CommandError, TextTrackMode};

/// Attribute overrides for one text track, addressed by index.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextTrackPatch {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<TextTrackMode>,
}

/// Closed set of commands an observer can apply to a resource.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Pause,
    Play,
    SetCurrentTime(f64),
    SetLoop(bool),
    SetMuted(bool),
    SetPlaybackRate(f64),
    SetTextTrack(TextTrackPatch),
    SetVolume(f64),
}

impl Command {
    /// Every accepted command name.
    pub const NAMES: [&'static str; 8] = [
        "pause",
        "play",
        "setCurrentTime",
        "setLoop",
        "setMuted",
        "setPlaybackRate",
        "setTextTrack",
        "setVolume",
    ];

    /// Parse a named command and its payload.
    ///
    /// # Errors
    /// Returns error if the name is not one of [`Command::NAMES`] or the
    /// payload has the wrong shape for it.
    pub fn parse(name: &str, value: &Value) -> Result<Self, CommandError> {
        match name {
            "pause" => Ok(Self::Pause),
            "play" => Ok(Self::Play),
            "setCurrentTime" => payload("setCurrentTime", value).map(Self::SetCurrentTime),
            "setLoop" => payload("setLoop", value).map(Self::SetLoop),
            "setMuted" => payload("setMuted", value).map(Self::SetMuted),
            "setPlaybackRate" => payload("setPlaybackRate", value).map(Self::SetPlaybackRate),
            "setTextTrack" => payload("setTextTrack", value).map(Self::SetTextTrack),
            "setVolume" => payload("setVolume", value).map(Self::SetVolume),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Wire name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Play => "play",
            Self::SetCurrentTime(_) => "setCurrentTime",
            Self::SetLoop(_) => "setLoop",
            Self::SetMuted(_) => "setMuted",
            Self::SetPlaybackRate(_) => "setPlaybackRate",
            Self::SetTextTrack(_) => "setTextTrack",
            Self::SetVolume(_) => "setVolume",
        }
    }

    /// Wire payload of the command.
    #[must_use]
    pub fn value(&self) -> Value {
        match self {
            Self::Pause | Self::Play => Value::Null,
            Self::SetCurrentTime(v) | Self::SetPlaybackRate(v) | Self::SetVolume(v) => {
                Value::from(*v)
            }
            Self::SetLoop(v) | Self::SetMuted(v) => Value::Bool(*v),
            Self::SetTextTrack(patch) => serde_json::to_value(patch).unwrap_or_default(),
        }
    }
}

fn payload<T>(name: &'static str, value: &Value) -> Result<T, CommandError>
where
    T: for<'de> Deserialize<'de>,
{
    T::deserialize(value).map_err(|source| CommandError::InvalidPayload { name, source })
}
