//! Native media resource interface.

use std::sync::Arc;

use media_monitor_core::{TextTrackInfo, TextTrackPatch, TimeRanges};

/// Callback bound to a native media event. Identity is the allocation.
pub type EventHandler = Arc<dyn Fn() + Send + Sync>;

/// Shared handle to a native media resource.
pub type MediaNode = Arc<dyn MediaElement>;

/// Native events a connector listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    Abort,
    CanPlay,
    CanPlayThrough,
    DurationChange,
    Emptied,
    Ended,
    Error,
    LoadedData,
    LoadedMetadata,
    LoadStart,
    Pause,
    Play,
    Playing,
    Progress,
    RateChange,
    Resize,
    Seeked,
    Seeking,
    Stalled,
    Suspend,
    TimeUpdate,
    VolumeChange,
    Waiting,
}

impl MediaEventKind {
    pub const ALL: [Self; 23] = [
        Self::Abort,
        Self::CanPlay,
        Self::CanPlayThrough,
        Self::DurationChange,
        Self::Emptied,
        Self::Ended,
        Self::Error,
        Self::LoadedData,
        Self::LoadedMetadata,
        Self::LoadStart,
        Self::Pause,
        Self::Play,
        Self::Playing,
        Self::Progress,
        Self::RateChange,
        Self::Resize,
        Self::Seeked,
        Self::Seeking,
        Self::Stalled,
        Self::Suspend,
        Self::TimeUpdate,
        Self::VolumeChange,
        Self::Waiting,
    ];

    /// Native event name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::CanPlay => "canplay",
            Self::CanPlayThrough => "canplaythrough",
            Self::DurationChange => "durationchange",
            Self::Emptied => "emptied",
            Self::Ended => "ended",
            Self::Error => "error",
            Self::LoadedData => "loadeddata",
            Self::LoadedMetadata => "loadedmetadata",
            Self::LoadStart => "loadstart",
            Self::Pause => "pause",
            Self::Play => "play",
            Self::Playing => "playing",
            Self::Progress => "progress",
            Self::RateChange => "ratechange",
            Self::Resize => "resize",
            Self::Seeked => "seeked",
            Self::Seeking => "seeking",
            Self::Stalled => "stalled",
            Self::Suspend => "suspend",
            Self::TimeUpdate => "timeupdate",
            Self::VolumeChange => "volumechange",
            Self::Waiting => "waiting",
        }
    }
}

/// Native error state of a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaError {
    pub code: u16,
    pub message: String,
}

/// Current values of every tracked attribute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaProperties {
    pub autoplay: bool,
    pub controls: bool,
    pub cross_origin: Option<String>,
    pub current_src: String,
    pub current_time: f64,
    pub duration: f64,
    pub ended: bool,
    pub error: Option<MediaError>,
    pub height: u32,
    pub looping: bool,
    pub muted: bool,
    pub network_state: u8,
    pub paused: bool,
    pub playback_rate: f64,
    pub poster: String,
    pub preload: String,
    pub ready_state: u8,
    pub seeking: bool,
    pub src: String,
    pub video_height: u32,
    pub video_width: u32,
    pub volume: f64,
    pub width: u32,
    pub buffered: TimeRanges,
    pub seekable: TimeRanges,
    pub played: TimeRanges,
}

/// A native media resource living in the target context.
///
/// Listener registration mirrors the host's own event API: the same
/// `EventHandler` allocation passed to `add_*` must be passed to `remove_*`.
pub trait MediaElement: Send + Sync {
    /// Upper-case tag name, e.g. `VIDEO`.
    fn tag_name(&self) -> String;

    /// Element id attribute, empty when unset.
    fn id(&self) -> String;

    /// Space separated class list.
    fn class_name(&self) -> String;

    /// Current attribute values.
    fn properties(&self) -> MediaProperties;

    fn text_tracks(&self) -> Vec<TextTrackInfo>;

    fn add_event_listener(&self, kind: MediaEventKind, handler: EventHandler);

    fn remove_event_listener(&self, kind: MediaEventKind, handler: &EventHandler);

    /// Bind a listener to changes of the nested text track list.
    fn add_text_tracks_listener(&self, handler: EventHandler);

    fn remove_text_tracks_listener(&self, handler: &EventHandler);

    /// Start playback.
    fn play(&self);

    /// Pause playback.
    fn pause(&self);

    /// Seek to `time` seconds.
    fn set_current_time(&self, time: f64);

    /// Restart from the beginning on end when set.
    fn set_loop(&self, looping: bool);

    /// Mute or unmute without touching the volume.
    fn set_muted(&self, muted: bool);

    /// Set the playback speed multiplier.
    fn set_playback_rate(&self, rate: f64);

    /// Set the volume in `0.0..=1.0`.
    fn set_volume(&self, volume: f64);

    /// Apply overrides to the track at `patch.index`; out of range is ignored.
    fn set_text_track(&self, patch: &TextTrackPatch);
}

/// Human readable locator: lower-case tag, then `#id`, then `.class` per class.
///
/// Not guaranteed unique.
#[must_use]
pub fn selector(element: &dyn MediaElement) -> String {
    let mut selector = element.tag_name().to_lowercase();

    let id = element.id();
    if !id.is_empty() {
        selector.push('#');
        selector.push_str(&id);
    }

    for class in element.class_name().split_whitespace() {
        selector.push('.');
        selector.push_str(class);
    }

    selector
}
