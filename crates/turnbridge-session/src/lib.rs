//! Running the bridge.
//!
//! Provides:
//! - `BridgeConfig` - Settings resolved from defaults, environment and CLI
//! - `TranscriptTailer` - Follow the growing transcript file
//! - `SnapshotMirror` - JSON side file mirroring the turn log
//! - `run` - Wire tailer, parser, injector and channel together

pub mod bridge;
pub mod config;
pub mod snapshot;
pub mod tailer;

pub use bridge::{BridgeError, TurnPump, build_injector, run};
pub use config::{BridgeConfig, ConfigError, InjectorKind};
pub use snapshot::{SnapshotError, SnapshotMirror};
pub use tailer::{TailError, TranscriptTailer};
pub use turnbridge_transport::DEFAULT_URL;
