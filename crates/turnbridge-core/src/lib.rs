//! Core building blocks for bridging a terminal conversation to remote clients.
//!
//! This crate provides:
//! - `sanitize` - ANSI stripping and noise / separator classification
//! - `TurnParser` - Streaming state machine turning transcript lines into turns
//! - `Turn` / `TurnLog` - The conversation data model
//! - `KeystrokeInjector` / `TtyLocator` - Traits for driving the bridged program

pub mod parser;
pub mod sanitize;
pub mod traits;
pub mod turn;

pub use parser::{Cursor, ParseEvent, Snapshot, TurnParser};
pub use sanitize::{SanitizedLine, sanitize};
pub use traits::{InjectError, KeystrokeInjector, TtyLocator};
pub use turn::{Turn, TurnLog};
