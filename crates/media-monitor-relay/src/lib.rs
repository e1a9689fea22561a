//! Relay between observer and target contexts.
//!
//! Provides:
//! - `RelayHub` - Session routing keyed by target
//! - `ObserverBridge` / `TargetProxy` - The hops on either side of the hub
//! - WebSocket transport for remote observers (feature: websocket)

pub mod bridge;
pub mod hub;
pub mod port;
pub mod proxy;

#[cfg(feature = "websocket")]
pub mod websocket;

pub use bridge::{HubLink, LocalHubLink, ObserverBridge};
pub use hub::{RelayHub, TargetRouter};
pub use port::{CallbackPort, ChannelPort, Port, PortId};
pub use proxy::{RuntimeUplink, TargetProxy, TargetTable};
