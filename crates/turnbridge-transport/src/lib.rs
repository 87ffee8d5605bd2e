//! Transport between the bridge and its remote endpoint.
//!
//! Provides:
//! - Wire protocol (JSON frames tagged by `type`)
//! - Menu selector parsing
//! - Command dispatch onto a [`turnbridge_core::KeystrokeInjector`]
//! - Reconnecting WebSocket channel with keep-alive

pub mod channel;
pub mod dispatch;
pub mod protocol;
pub mod selector;

pub use channel::{BridgeChannel, ChannelError, ChannelOptions, DEFAULT_URL, TurnOutbox};
pub use dispatch::{CommandDispatcher, MenuReceiver};
pub use protocol::{Inbound, InboundCommand, OutboundMessage};
pub use selector::{SelectorError, parse_selector};
