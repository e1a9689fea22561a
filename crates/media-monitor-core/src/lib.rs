//! Core abstractions shared by every media monitor execution context.
//!
//! This crate provides the fundamental building blocks:
//! - `Channel` - Named, source-tagged, best-effort transport between two endpoints
//! - `MessageBus` - In-memory endpoint with a delivery queue
//! - `Envelope` / `Message` - Wire protocol spoken at every hop
//! - `Command` - Closed set of remote commands a resource accepts
//! - `MonitorConfig` - Source tags and discovery settings

pub mod bus;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod guid;
pub mod message;
pub mod ranges;

pub use bus::MessageBus;
pub use channel::{Channel, Endpoint, Listener};
pub use command::{Command, TextTrackPatch};
pub use config::MonitorConfig;
pub use error::{CommandError, ConfigError, DecodeError};
pub use guid::Guid;
pub use message::{
    Envelope, ErrorValue, EventPayload, MediaSnapshot, Message, TextTrackInfo, TextTrackMode,
};
pub use ranges::{RangePairs, TimeRanges};
