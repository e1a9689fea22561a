//! Per-resource connector.
//!
//! A connector turns the native events of one media resource into
//! `mediaEvent` messages and applies `mediaEvent` commands coming back from
//! the observer. It registers the resource before binding any native
//! listener, so `register` always precedes the resource's first event.

use std::sync::{Arc, Weak};

pub use media_monitor_core::message::TEXT_TRACKS_CHANGE;
use media_monitor_core::{
    Channel, Command, Envelope, ErrorValue, EventPayload, Guid, Listener, MediaSnapshot, Message,
};
use serde_json::Value;

use crate::element::{EventHandler, MediaEventKind, MediaNode, MediaProperties, selector};

struct Shared {
    guid: Guid,
    element: MediaNode,
    channel: Arc<Channel>,
    observer_source: String,
}

impl Shared {
    fn snapshot(&self) -> MediaSnapshot {
        let props = self.element.properties();
        let error = error_value(&props);
        MediaSnapshot {
            autoplay: props.autoplay,
            controls: props.controls,
            cross_origin: props.cross_origin,
            current_src: props.current_src,
            current_time: props.current_time,
            duration: props.duration,
            ended: props.ended,
            error,
            height: props.height,
            looping: props.looping,
            muted: props.muted,
            network_state: props.network_state,
            paused: props.paused,
            playback_rate: props.playback_rate,
            poster: props.poster,
            preload: props.preload,
            ready_state: props.ready_state,
            seeking: props.seeking,
            src: props.src,
            video_height: props.video_height,
            video_width: props.video_width,
            volume: props.volume,
            width: props.width,
            buffered: props.buffered.to_pairs(),
            seekable: props.seekable.to_pairs(),
            played: props.played.to_pairs(),
            text_tracks: self.element.text_tracks(),
        }
    }

    fn register(&self) {
        self.channel.send(Message::Register {
            guid: self.guid.clone(),
            selector: selector(self.element.as_ref()),
            value: self.snapshot(),
        });
    }

    fn unregister(&self) {
        self.channel.send(Message::Unregister {
            guid: self.guid.clone(),
        });
    }

    fn send(&self, name: &str, mut payload: EventPayload) {
        let props = self.element.properties();
        payload.buffered = Some(props.buffered.to_pairs());
        payload.seekable = Some(props.seekable.to_pairs());

        self.channel.send(Message::MediaEvent {
            guid: self.guid.clone(),
            name: name.to_string(),
            value: payload.to_value(),
        });
    }

    fn on_event(&self, kind: MediaEventKind) {
        let props = self.element.properties();
        let payload = match kind {
            MediaEventKind::DurationChange => EventPayload {
                duration: Some(props.duration),
                ..EventPayload::default()
            },
            MediaEventKind::Error => EventPayload {
                error: error_value(&props),
                ..EventPayload::default()
            },
            MediaEventKind::Pause | MediaEventKind::Playing => EventPayload {
                current_time: Some(props.current_time),
                ..EventPayload::default()
            },
            MediaEventKind::RateChange => EventPayload {
                playback_rate: Some(props.playback_rate),
                ..EventPayload::default()
            },
            MediaEventKind::Resize => EventPayload {
                video_height: Some(props.video_height),
                video_width: Some(props.video_width),
                ..EventPayload::default()
            },
            MediaEventKind::TimeUpdate => EventPayload {
                current_time: Some(props.current_time),
                played: Some(props.played.to_pairs()),
                ..EventPayload::default()
            },
            MediaEventKind::VolumeChange => EventPayload {
                muted: Some(props.muted),
                volume: Some(props.volume),
                ..EventPayload::default()
            },
            _ => EventPayload::default(),
        };

        self.send(kind.as_str(), payload);
    }

    fn on_text_tracks_change(&self) {
        self.send(
            TEXT_TRACKS_CHANGE,
            EventPayload {
                text_tracks: Some(self.element.text_tracks()),
                ..EventPayload::default()
            },
        );
    }

    fn on_message(&self, value: &Value) {
        let Ok(envelope) = Envelope::from_source(value, &self.observer_source) else {
            return;
        };

        let Message::MediaEvent { guid, name, value } = envelope.message else {
            return;
        };

        if guid != self.guid {
            return;
        }

        match Command::parse(&name, &value) {
            Ok(command) => self.apply(command),
            Err(e) => tracing::trace!(guid = %self.guid, "ignoring command: {e}"),
        }
    }

    fn apply(&self, command: Command) {
        tracing::debug!(guid = %self.guid, command = command.name(), "applying remote command");

        match command {
            Command::Pause => self.element.pause(),
            Command::Play => self.element.play(),
            Command::SetCurrentTime(time) => self.element.set_current_time(time),
            Command::SetLoop(looping) => self.element.set_loop(looping),
            Command::SetMuted(muted) => self.element.set_muted(muted),
            Command::SetPlaybackRate(rate) => self.element.set_playback_rate(rate),
            Command::SetTextTrack(patch) => self.element.set_text_track(&patch),
            Command::SetVolume(volume) => self.element.set_volume(volume),
        }
    }
}

fn error_value(props: &MediaProperties) -> Option<ErrorValue> {
    props
        .error
        .as_ref()
        .map(|error| ErrorValue::from_native(error.code, &error.message))
}

/// Bridge between one native media resource and the shared channel.
pub struct MediaConnector {
    shared: Arc<Shared>,
    bindings: Vec<(MediaEventKind, EventHandler)>,
    text_tracks_handler: Option<EventHandler>,
    message_listener: Option<Listener>,
}

impl MediaConnector {
    /// Wrap a resource: listen for commands, register, then bind native events.
    ///
    /// Commands are only accepted from messages tagged `observer_source`.
    #[must_use]
    pub fn new(element: MediaNode, channel: Arc<Channel>, observer_source: &str) -> Self {
        let shared = Arc::new(Shared {
            guid: Guid::generate(),
            element,
            channel,
            observer_source: observer_source.to_string(),
        });

        let mut connector = Self {
            shared,
            bindings: Vec::with_capacity(MediaEventKind::ALL.len()),
            text_tracks_handler: None,
            message_listener: None,
        };

        connector.listen();
        connector.shared.register();
        connector.bind_media_events();

        tracing::debug!(guid = %connector.shared.guid, "media connector created");
        connector
    }

    /// Identity assigned to the resource.
    #[must_use]
    pub fn guid(&self) -> &Guid {
        &self.shared.guid
    }

    /// Resend the full registration, e.g. for an observer that reconnected.
    pub fn register(&self) {
        self.shared.register();
    }

    /// Number of native listeners currently bound, text track list included.
    #[must_use]
    pub fn bound_listener_count(&self) -> usize {
        self.bindings.len() + usize::from(self.text_tracks_handler.is_some())
    }

    /// Unbind everything and tell the observer the resource is gone.
    ///
    /// A second call does nothing.
    pub fn destroy(&mut self) {
        let Some(listener) = self.message_listener.take() else {
            return;
        };

        for (kind, handler) in self.bindings.drain(..) {
            self.shared.element.remove_event_listener(kind, &handler);
        }
        if let Some(handler) = self.text_tracks_handler.take() {
            self.shared.element.remove_text_tracks_listener(&handler);
        }

        self.shared.channel.remove_listener(&listener);
        self.shared.unregister();

        tracing::debug!(guid = %self.shared.guid, "media connector destroyed");
    }

    fn listen(&mut self) {
        let weak = Arc::downgrade(&self.shared);
        let listener: Listener = Arc::new(move |value: &Value| {
            if let Some(shared) = weak.upgrade() {
                shared.on_message(value);
            }
        });

        self.shared.channel.add_listener(Arc::clone(&listener));
        self.message_listener = Some(listener);
    }

    fn bind_media_events(&mut self) {
        for kind in MediaEventKind::ALL {
            let handler = event_handler(Arc::downgrade(&self.shared), kind);
            self.shared
                .element
                .add_event_listener(kind, Arc::clone(&handler));
            self.bindings.push((kind, handler));
        }

        let weak = Arc::downgrade(&self.shared);
        let handler: EventHandler = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_text_tracks_change();
            }
        });
        self.shared
            .element
            .add_text_tracks_listener(Arc::clone(&handler));
        self.text_tracks_handler = Some(handler);
    }
}

fn event_handler(weak: Weak<Shared>, kind: MediaEventKind) -> EventHandler {
    Arc::new(move || {
        if let Some(shared) = weak.upgrade() {
            shared.on_event(kind);
        }
    })
}

#[cfg(test)]
mod tests {
    use media_monitor_core::{
        Endpoint, MessageBus, TextTrackInfo, TextTrackMode, TimeRanges, config::OBSERVER_SOURCE,
    };
    use serde_json::json;

    use super::*;
    use crate::element::{MediaElement, MediaError};
    use crate::testing::{FakeMediaElement, Recorder};

    struct Fixture {
        element: Arc<FakeMediaElement>,
        page: Arc<MessageBus>,
        panel: Arc<MessageBus>,
        sent: Recorder,
        connector: MediaConnector,
    }

    fn fixture(element: FakeMediaElement) -> Fixture {
        let element = Arc::new(element);
        let page = MessageBus::new("page");
        let panel = MessageBus::new("panel");
        let sent = Recorder::attach(panel.as_ref());
        let channel = Arc::new(Channel::new(
            "mm-content-script",
            page.clone(),
            panel.clone(),
        ));
        let connector = MediaConnector::new(element.clone(), channel, OBSERVER_SOURCE);
        panel.pump();

        Fixture {
            element,
            page,
            panel,
            sent,
            connector,
        }
    }

    fn video() -> FakeMediaElement {
        FakeMediaElement::new("VIDEO").with_properties(|p| {
            p.buffered = [(0.0, 42.0)].into_iter().collect();
            p.error = Some(MediaError {
                code: 3,
                message: String::new(),
            });
        })
    }

    fn command(guid: &Guid, name: &str, value: Value) -> Value {
        json!({
            "action": "mediaEvent",
            "src": OBSERVER_SOURCE,
            "guid": guid.as_str(),
            "name": name,
            "value": value,
        })
    }

    #[test]
    fn test_registers_with_snapshot() {
        let f = fixture(video());
        let sent = f.sent.take();
        assert_eq!(sent.len(), 1);

        let envelope = Envelope::from_value(&sent[0]).unwrap();
        let Message::Register {
            guid,
            selector,
            value,
        } = envelope.message
        else {
            panic!("Wrong message type");
        };
        assert_eq!(&guid, f.connector.guid());
        assert_eq!(selector, "video");
        assert_eq!(value.error, Some(ErrorValue::Code(3)));
        assert_eq!(value.buffered, vec![[0.0, 42.0]]);
        assert!(value.played.is_empty());
        assert_eq!(sent[0]["value"]["error"], json!(3));
    }

    #[test]
    fn test_extended_error_sent_as_message() {
        let f = fixture(FakeMediaElement::new("AUDIO").with_properties(|p| {
            p.error = Some(MediaError {
                code: 4,
                message: "404".to_string(),
            });
        }));
        let sent = f.sent.take();
        assert_eq!(sent[0]["value"]["error"], json!("404"));
    }

    #[test]
    fn test_binds_every_event() {
        let f = fixture(video());
        for kind in MediaEventKind::ALL {
            assert_eq!(f.element.listener_count(kind), 1, "{}", kind.as_str());
        }
        assert_eq!(f.element.text_tracks_listener_count(), 1);
        assert_eq!(f.connector.bound_listener_count(), 24);
    }

    #[test]
    fn test_destroy_unbinds_and_unregisters() {
        let mut f = fixture(video());
        f.sent.take();

        f.connector.destroy();
        f.panel.pump();

        let removed = f.element.removed_events();
        assert_eq!(removed.len(), MediaEventKind::ALL.len());
        for kind in MediaEventKind::ALL {
            assert_eq!(removed.iter().filter(|k| **k == kind).count(), 1);
            assert_eq!(f.element.listener_count(kind), 0);
        }
        assert_eq!(f.element.text_tracks_listener_count(), 0);
        assert_eq!(f.page.listener_count(), 0);

        let sent = f.sent.take();
        assert_eq!(
            sent,
            vec![json!({"action": "unregister", "guid": f.connector.guid().as_str(), "src": "mm-content-script"})]
        );

        f.connector.destroy();
        f.panel.pump();
        assert!(f.sent.take().is_empty());
    }

    #[test]
    fn test_events_carry_payload_and_ranges() {
        let f = fixture(video());
        f.sent.take();

        f.element.update(|p| {
            p.playback_rate = 2.0;
            p.seekable = [(0.0, 100.0)].into_iter().collect();
        });
        f.element.dispatch(MediaEventKind::RateChange);
        f.element.dispatch(MediaEventKind::Abort);
        f.panel.pump();

        let sent = f.sent.take();
        assert_eq!(sent[0]["name"], "ratechange");
        assert_eq!(
            sent[0]["value"],
            json!({"playbackRate": 2.0, "buffered": [[0.0, 42.0]], "seekable": [[0.0, 100.0]]})
        );
        assert_eq!(sent[1]["name"], "abort");
        assert_eq!(
            sent[1]["value"],
            json!({"buffered": [[0.0, 42.0]], "seekable": [[0.0, 100.0]]})
        );
    }

    #[test]
    fn test_time_update_payload() {
        let f = fixture(video());
        f.sent.take();

        f.element.update(|p| {
            p.current_time = 12.0;
            p.played = TimeRanges::from_iter([(0.0, 12.0)]);
        });
        f.element.dispatch(MediaEventKind::TimeUpdate);
        f.panel.pump();

        let sent = f.sent.take();
        assert_eq!(sent[0]["value"]["currentTime"], json!(12.0));
        assert_eq!(sent[0]["value"]["played"], json!([[0.0, 12.0]]));
    }

    #[test]
    fn test_text_tracks_change_is_synthetic_event() {
        let f = fixture(video());
        f.sent.take();

        f.element.set_text_tracks(vec![TextTrackInfo {
            id: "en".into(),
            kind: "subtitles".into(),
            label: "English".into(),
            language: "en".into(),
            mode: TextTrackMode::Showing,
        }]);
        f.element.dispatch_text_tracks_change();
        f.panel.pump();

        let sent = f.sent.take();
        assert_eq!(sent[0]["name"], TEXT_TRACKS_CHANGE);
        assert_eq!(sent[0]["value"]["textTracks"][0]["mode"], "showing");
    }

    #[test]
    fn test_applies_known_commands() {
        let f = fixture(video());
        let guid = f.connector.guid().clone();

        f.page.post(command(&guid, "setVolume", json!(0.25)));
        f.page.post(command(&guid, "setMuted", json!(true)));
        f.page.post(command(&guid, "setLoop", json!(true)));
        f.page.post(command(&guid, "setCurrentTime", json!(30.0)));
        f.page.post(command(&guid, "setPlaybackRate", json!(1.5)));
        f.page.post(command(&guid, "play", Value::Null));
        f.page.pump();

        let props = f.element.properties();
        assert!((props.volume - 0.25).abs() < f64::EPSILON);
        assert!(props.muted);
        assert!(props.looping);
        assert!((props.current_time - 30.0).abs() < f64::EPSILON);
        assert!((props.playback_rate - 1.5).abs() < f64::EPSILON);
        assert!(!props.paused);

        f.page.post(command(&guid, "pause", Value::Null));
        f.page.pump();
        assert!(f.element.properties().paused);
    }

    #[test]
    fn test_set_text_track_applies_overrides() {
        let f = fixture(video());
        f.element.set_text_tracks(vec![TextTrackInfo::default(), TextTrackInfo::default()]);
        let guid = f.connector.guid().clone();

        f.page.post(command(
            &guid,
            "setTextTrack",
            json!({"index": 1, "mode": "showing", "label": "Commentary"}),
        ));
        f.page.post(command(&guid, "setTextTrack", json!({"index": 9, "mode": "showing"})));
        f.page.pump();

        let tracks = f.element.text_tracks();
        assert_eq!(tracks[0], TextTrackInfo::default());
        assert_eq!(tracks[1].mode, TextTrackMode::Showing);
        assert_eq!(tracks[1].label, "Commentary");
    }

    #[test]
    fn test_ignores_foreign_and_mismatched_commands() {
        let f = fixture(video());
        let guid = f.connector.guid().clone();

        let mut foreign = command(&guid, "setVolume", json!(0.1));
        foreign["src"] = json!("mm-content-script");
        f.page.post(foreign);
        f.page.post(command(&Guid::from("other123"), "setVolume", json!(0.1)));
        f.page.post(command(&guid, "toString", Value::Null));
        f.page.post(command(&guid, "setVolume", json!("loud")));
        f.page.post(json!({"action": "ready", "src": OBSERVER_SOURCE, "guid": guid.as_str()}));
        f.page.post(json!("unrelated traffic"));
        f.page.pump();

        let props = f.element.properties();
        assert!((props.volume - 1.0).abs() < f64::EPSILON);
        assert_eq!(f.element.commands_applied(), 0);
    }
}
