//! Target-side media monitoring.
//!
//! Provides:
//! - `MediaElement` / `MediaDocument` - Native resource and container interfaces
//! - `MediaConnector` - Per-resource event and command bridge
//! - `MediaManager` - Discovery, handshake and connector lifecycle
//! - In-memory fakes (feature: testing)

pub mod connector;
pub mod document;
pub mod element;
pub mod manager;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use connector::{MediaConnector, TEXT_TRACKS_CHANGE};
pub use document::{MediaDocument, MutationCallback, MutationRecord};
pub use element::{
    EventHandler, MediaElement, MediaError, MediaEventKind, MediaNode, MediaProperties, selector,
};
pub use manager::MediaManager;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMediaElement;

    #[test]
    fn test_selector_with_id_and_classes() {
        let video = FakeMediaElement::new("VIDEO")
            .with_id("foo")
            .with_class("a b");
        assert_eq!(selector(&video), "video#foo.a.b");
    }

    #[test]
    fn test_selector_without_id() {
        let audio = FakeMediaElement::new("AUDIO").with_class("a b");
        assert_eq!(selector(&audio), "audio.a.b");
    }

    #[test]
    fn test_selector_tag_only() {
        assert_eq!(selector(&FakeMediaElement::new("VIDEO")), "video");
    }
}
