//! Target page to observer panel over a bus pair, with no relay in between.

use std::sync::Arc;

use media_monitor_core::{Command, MessageBus, MonitorConfig};
use media_monitor_mirror::{EventSummary, Mirror};
use media_monitor_target::{
    MediaElement, MediaEventKind, MediaManager, MediaNode,
    testing::{FakeDocument, FakeMediaElement},
};

struct Direct {
    page: Arc<MessageBus>,
    panel: Arc<MessageBus>,
    document: Arc<FakeDocument>,
    manager: MediaManager,
    mirror: Mirror,
}

impl Direct {
    fn new() -> Self {
        let config = MonitorConfig::default();
        let page = MessageBus::new("page");
        let panel = MessageBus::new("panel");
        let document = FakeDocument::new();

        // Each side listens on its own bus and posts to the other.
        let manager = MediaManager::new(
            config.clone(),
            document.clone(),
            page.clone(),
            panel.clone(),
        );
        let mirror = Mirror::new(config, panel.clone(), page.clone());

        Self {
            page,
            panel,
            document,
            manager,
            mirror,
        }
    }

    fn start(&self) {
        self.manager.initialize();
        self.mirror.initialize();
        self.settle();
    }

    fn settle(&self) {
        while self.page.pump() + self.panel.pump() > 0 {}
    }

    fn add_video(&self, id: &str) -> Arc<FakeMediaElement> {
        let video = Arc::new(FakeMediaElement::new("VIDEO").with_id(id));
        let node: MediaNode = video.clone();
        self.document.append(node);
        video
    }
}

#[test]
fn test_handshake_without_relay() {
    let direct = Direct::new();
    direct.add_video("main");
    direct.start();

    assert!(direct.manager.is_ready());
    let elements = direct.mirror.elements();
    assert_eq!(elements.len(), 1);
    assert_eq!(elements[0].selector, "video#main");
    assert_eq!(direct.mirror.current(), Some(elements[0].guid.clone()));
}

#[test]
fn test_unknown_duration_mirrored_as_nan() {
    let direct = Direct::new();
    let video = direct.add_video("main");
    direct.start();
    let guid = direct.mirror.elements()[0].guid.clone();

    assert!(video.properties().duration.is_nan());
    video.dispatch(MediaEventKind::DurationChange);
    direct.settle();

    let media = direct.mirror.media(&guid).unwrap();
    assert!(media.media.duration.is_nan());
    match media.events.last().and_then(|e| e.value.clone()) {
        Some(EventSummary::Number(duration)) => assert!(duration.is_nan()),
        other => panic!("unexpected summary {other:?}"),
    }
}

#[test]
fn test_commands_and_removal_without_relay() {
    let direct = Direct::new();
    let video = direct.add_video("main");
    direct.start();
    let guid = direct.mirror.elements()[0].guid.clone();

    assert!(direct.mirror.send_to_current(&Command::SetMuted(true)));
    direct.settle();
    assert_eq!(video.commands_applied(), 1);
    assert!(video.properties().muted);

    let node: MediaNode = video;
    direct.document.remove(&node);
    direct.document.flush();
    direct.settle();

    assert_eq!(direct.mirror.element_count(), 0);
    assert!(direct.mirror.media(&guid).is_none());
    assert_eq!(direct.manager.connector_count(), 0);
}
