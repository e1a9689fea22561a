//! Observer-side media monitoring.
//!
//! `Mirror` keeps a local, eventually consistent copy of every media element
//! a target reports, with a per-element event log, and sends remote commands
//! back to those elements.

pub mod mirror;
pub mod state;

pub use mirror::Mirror;
pub use state::{ElementEntry, EventSummary, LoggedEvent, MediaState};
