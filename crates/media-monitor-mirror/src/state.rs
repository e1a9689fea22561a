//! Mirrored state of one media element and its event log.

use std::time::{SystemTime, UNIX_EPOCH};

use media_monitor_core::{EventPayload, Guid, MediaSnapshot, message::TEXT_TRACKS_CHANGE};
use serde::{Deserialize, Serialize};

/// A media element known to the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementEntry {
    pub guid: Guid,
    pub selector: String,
}

/// Human-facing value shown next to a logged event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventSummary {
    Number(f64),
    Text(String),
}

/// One entry of the append-only event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub name: String,
    pub value: Option<EventSummary>,
}

/// Local projection of one remote media element.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaState {
    pub media: MediaSnapshot,
    pub events: Vec<LoggedEvent>,
}

impl MediaState {
    #[must_use]
    pub const fn from_snapshot(media: MediaSnapshot) -> Self {
        Self {
            media,
            events: Vec::new(),
        }
    }

    /// Fold one native event into the state.
    ///
    /// Returns whether the event was appended to the log. Time updates and
    /// text track changes are folded in but never logged.
    pub fn apply_event(&mut self, name: &str, payload: EventPayload) -> bool {
        let media = &mut self.media;
        if let Some(buffered) = payload.buffered {
            media.buffered = buffered;
        }
        if let Some(seekable) = payload.seekable {
            media.seekable = seekable;
        }

        match name {
            "durationchange" => media.duration = payload.duration.unwrap_or(f64::NAN),
            "pause" => media.paused = true,
            "playing" => media.paused = false,
            "ratechange" => {
                if let Some(rate) = payload.playback_rate {
                    media.playback_rate = rate;
                }
            }
            "resize" => {
                if let Some(width) = payload.video_width {
                    media.video_width = width;
                }
                if let Some(height) = payload.video_height {
                    media.video_height = height;
                }
            }
            TEXT_TRACKS_CHANGE => {
                if let Some(tracks) = payload.text_tracks {
                    media.text_tracks = tracks;
                }
                return false;
            }
            "timeupdate" => {
                if let Some(time) = payload.current_time {
                    media.current_time = time;
                }
                if let Some(played) = payload.played {
                    media.played = played;
                }
                return false;
            }
            "volumechange" => {
                if let Some(volume) = payload.volume {
                    media.volume = volume;
                }
                if let Some(muted) = payload.muted {
                    media.muted = muted;
                }
            }
            _ => {}
        }

        self.events.push(LoggedEvent {
            timestamp: now_millis(),
            name: name.to_string(),
            value: self.summarize(name),
        });
        true
    }

    pub fn clear_events(&mut self) {
        self.events.clear();
    }

    // Summaries read the already updated state, not the payload.
    fn summarize(&self, name: &str) -> Option<EventSummary> {
        let media = &self.media;
        match name {
            "durationchange" => Some(EventSummary::Number(media.duration)),
            "resize" => Some(EventSummary::Text(format!(
                "{}x{}",
                media.video_width, media.video_height
            ))),
            "pause" | "playing" | "seeked" => Some(EventSummary::Number(media.current_time)),
            "volumechange" if media.muted => Some(EventSummary::Text("muted".to_string())),
            "volumechange" => Some(EventSummary::Text(format!(
                "{:.0}%",
                (media.volume * 100.0).round()
            ))),
            _ => None,
        }
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use media_monitor_core::TextTrackInfo;

    use super::*;

    fn state() -> MediaState {
        MediaState::from_snapshot(MediaSnapshot {
            duration: f64::NAN,
            paused: true,
            playback_rate: 1.0,
            volume: 1.0,
            ..MediaSnapshot::default()
        })
    }

    fn logged(state: &MediaState) -> Vec<(&str, Option<EventSummary>)> {
        state
            .events
            .iter()
            .map(|e| (e.name.as_str(), e.value.clone()))
            .collect()
    }

    #[test]
    fn test_mapped_fields_update() {
        let mut state = state();

        state.apply_event(
            "durationchange",
            EventPayload {
                duration: Some(12.5),
                ..EventPayload::default()
            },
        );
        state.apply_event("playing", EventPayload::default());
        state.apply_event(
            "resize",
            EventPayload {
                video_width: Some(640),
                video_height: Some(360),
                ..EventPayload::default()
            },
        );
        state.apply_event(
            "ratechange",
            EventPayload {
                playback_rate: Some(2.0),
                ..EventPayload::default()
            },
        );

        assert!((state.media.duration - 12.5).abs() < f64::EPSILON);
        assert!(!state.media.paused);
        assert_eq!((state.media.video_width, state.media.video_height), (640, 360));
        assert!((state.media.playback_rate - 2.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_ranges_follow_every_event() {
        let mut state = state();
        state.apply_event(
            "progress",
            EventPayload {
                buffered: Some(vec![[0.0, 4.0]]),
                seekable: Some(vec![[0.0, 10.0]]),
                ..EventPayload::default()
            },
        );

        assert_eq!(state.media.buffered, vec![[0.0, 4.0]]);
        assert_eq!(state.media.seekable, vec![[0.0, 10.0]]);
        assert_eq!(logged(&state), vec![("progress", None)]);
    }

    #[test]
    fn test_time_updates_and_track_changes_not_logged() {
        let mut state = state();

        let logged_time = state.apply_event(
            "timeupdate",
            EventPayload {
                current_time: Some(3.0),
                played: Some(vec![[0.0, 3.0]]),
                ..EventPayload::default()
            },
        );
        let logged_tracks = state.apply_event(
            TEXT_TRACKS_CHANGE,
            EventPayload {
                text_tracks: Some(vec![TextTrackInfo::default()]),
                ..EventPayload::default()
            },
        );

        assert!(!logged_time);
        assert!(!logged_tracks);
        assert!(state.events.is_empty());
        assert!((state.media.current_time - 3.0).abs() < f64::EPSILON);
        assert_eq!(state.media.played, vec![[0.0, 3.0]]);
        assert_eq!(state.media.text_tracks.len(), 1);
    }

    #[test]
    fn test_summaries() {
        let mut state = state();
        state.media.current_time = 4.0;

        state.apply_event(
            "resize",
            EventPayload {
                video_width: Some(1280),
                video_height: Some(720),
                ..EventPayload::default()
            },
        );
        state.apply_event("pause", EventPayload::default());
        state.apply_event("seeked", EventPayload::default());
        state.apply_event(
            "volumechange",
            EventPayload {
                volume: Some(0.426),
                muted: Some(false),
                ..EventPayload::default()
            },
        );
        state.apply_event(
            "volumechange",
            EventPayload {
                volume: Some(0.426),
                muted: Some(true),
                ..EventPayload::default()
            },
        );
        state.apply_event("waiting", EventPayload::default());

        assert_eq!(
            logged(&state),
            vec![
                ("resize", Some(EventSummary::Text("1280x720".to_string()))),
                ("pause", Some(EventSummary::Number(4.0))),
                ("seeked", Some(EventSummary::Number(4.0))),
                ("volumechange", Some(EventSummary::Text("43%".to_string()))),
                ("volumechange", Some(EventSummary::Text("muted".to_string()))),
                ("waiting", None),
            ]
        );
    }

    #[test]
    fn test_unknown_duration_is_nan() {
        let mut state = state();
        state.apply_event("durationchange", EventPayload::default());
        assert!(state.media.duration.is_nan());
    }

    #[test]
    fn test_clear_events() {
        let mut state = state();
        state.apply_event("play", EventPayload::default());
        assert!(state.events[0].timestamp > 0);

        state.clear_events();
        assert!(state.events.is_empty());
    }
}
