//! Bridge configuration.
//!
//! Every setting has a default; environment variables override them and an
//! explicit endpoint URL overrides `TURNBRIDGE_URL`.

use std::{path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use turnbridge_transport::{ChannelOptions, DEFAULT_URL};

/// Endpoint URL, when none is given explicitly.
pub const ENV_URL: &str = "TURNBRIDGE_URL";
/// Transcript file path.
pub const ENV_TRANSCRIPT: &str = "TURNBRIDGE_TRANSCRIPT";
/// Snapshot file path.
pub const ENV_SNAPSHOT: &str = "TURNBRIDGE_SNAPSHOT";
/// Injector kind, `tmux` or `tty`.
pub const ENV_INJECTOR: &str = "TURNBRIDGE_INJECTOR";
/// tmux session name.
pub const ENV_TMUX_SESSION: &str = "TURNBRIDGE_TMUX_SESSION";
/// Process name for the TTY injector.
pub const ENV_TTY_PROCESS: &str = "TURNBRIDGE_TTY_PROCESS";

pub const DEFAULT_TRANSCRIPT: &str = "logs/claude_session.log";
pub const DEFAULT_SNAPSHOT: &str = "logs/responses.json";
pub const DEFAULT_TMUX_SESSION: &str = "claude_aura";
pub const DEFAULT_TTY_PROCESS: &str = "claude";

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown injector kind {0:?} (expected \"tmux\" or \"tty\")")]
    UnknownInjector(String),
    #[error("{0} must not be empty")]
    Empty(&'static str),
}

/// Which keystroke injector drives the bridged program.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InjectorKind {
    /// `tmux send-keys` against a named session.
    #[default]
    Tmux,
    /// Typing straight into the program's terminal device.
    Tty,
}

impl FromStr for InjectorKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tmux" => Ok(Self::Tmux),
            "tty" => Ok(Self::Tty),
            _ => Err(ConfigError::UnknownInjector(s.to_string())),
        }
    }
}

/// Resolved bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Endpoint to connect to.
    pub url: String,
    /// Transcript file to follow.
    pub transcript_path: PathBuf,
    /// Side file mirroring the turn log.
    pub snapshot_path: PathBuf,
    /// Which injector drives the bridged program.
    pub injector: InjectorKind,
    /// tmux session targeted by the tmux injector.
    pub tmux_session: String,
    /// Process whose terminal the TTY injector types into.
    pub tty_process: String,

    /// Tailer sleep when no new line is available.
    pub poll_delay: Duration,
    /// Pause between a connection loss and the next attempt.
    pub reconnect_delay: Duration,
    /// Keep-alive ping period.
    pub ping_interval: Duration,
    /// Wait for a keep-alive acknowledgement.
    pub ping_timeout: Duration,
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Upper bound on writing one frame.
    pub send_timeout: Duration,
    /// Upper bound on one injector command.
    pub injector_timeout: Duration,
    /// Pause between characters typed by the TTY injector.
    pub char_delay: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            transcript_path: PathBuf::from(DEFAULT_TRANSCRIPT),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT),
            injector: InjectorKind::default(),
            tmux_session: DEFAULT_TMUX_SESSION.to_string(),
            tty_process: DEFAULT_TTY_PROCESS.to_string(),
            poll_delay: Duration::from_millis(100),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(20),
            injector_timeout: Duration::from_secs(5),
            char_delay: Duration::from_millis(20),
        }
    }
}

impl BridgeConfig {
    /// Resolve from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable holds an unusable value.
    pub fn from_env(url: Option<String>) -> Result<Self, ConfigError> {
        Self::from_lookup(url, |key| std::env::var(key).ok())
    }

    /// Resolve using `lookup` as the variable source.
    ///
    /// # Errors
    /// Returns error if a variable holds an unusable value.
    pub fn from_lookup<F>(url: Option<String>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(url) = url.or_else(|| var(ENV_URL)) {
            config.url = url;
        }
        if let Some(path) = var(ENV_TRANSCRIPT) {
            config.transcript_path = PathBuf::from(path);
        }
        if let Some(path) = var(ENV_SNAPSHOT) {
            config.snapshot_path = PathBuf::from(path);
        }
        if let Some(kind) = var(ENV_INJECTOR) {
            config.injector = kind.parse()?;
        }
        if let Some(session) = var(ENV_TMUX_SESSION) {
            config.tmux_session = session;
        }
        if let Some(name) = var(ENV_TTY_PROCESS) {
            config.tty_process = name;
        }

        if config.url.trim().is_empty() {
            return Err(ConfigError::Empty("endpoint URL"));
        }
        Ok(config)
    }

    /// Channel settings derived from this configuration.
    #[must_use]
    pub fn channel_options(&self) -> ChannelOptions {
        ChannelOptions {
            url: self.url.clone(),
            reconnect_delay: self.reconnect_delay,
            ping_interval: self.ping_interval,
            ping_timeout: self.ping_timeout,
            connect_timeout: self.connect_timeout,
            send_timeout: self.send_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio_test::{assert_err, assert_ok};

    use super::*;

    fn resolve(url: Option<&str>, vars: &[(&str, &str)]) -> Result<BridgeConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        BridgeConfig::from_lookup(url.map(str::to_string), |key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = assert_ok!(resolve(None, &[]));
        assert_eq!(config.url, "ws://localhost:8765");
        assert_eq!(config.transcript_path, PathBuf::from("logs/claude_session.log"));
        assert_eq!(config.snapshot_path, PathBuf::from("logs/responses.json"));
        assert_eq!(config.injector, InjectorKind::Tmux);
        assert_eq!(config.tmux_session, "claude_aura");
        assert_eq!(config.poll_delay, Duration::from_millis(100));
    }

    #[test]
    fn test_url_precedence() {
        let from_env = assert_ok!(resolve(None, &[(ENV_URL, "ws://env:1")]));
        assert_eq!(from_env.url, "ws://env:1");

        let explicit = assert_ok!(resolve(Some("ws://arg:2"), &[(ENV_URL, "ws://env:1")]));
        assert_eq!(explicit.url, "ws://arg:2");
    }

    #[test]
    fn test_overrides() {
        let config = assert_ok!(resolve(
            None,
            &[
                (ENV_TRANSCRIPT, "/tmp/t.log"),
                (ENV_SNAPSHOT, "/tmp/s.json"),
                (ENV_INJECTOR, "TTY"),
                (ENV_TTY_PROCESS, "node"),
                (ENV_TMUX_SESSION, "  "),
            ]
        ));
        assert_eq!(config.transcript_path, PathBuf::from("/tmp/t.log"));
        assert_eq!(config.snapshot_path, PathBuf::from("/tmp/s.json"));
        assert_eq!(config.injector, InjectorKind::Tty);
        assert_eq!(config.tty_process, "node");
        assert_eq!(config.tmux_session, "claude_aura");
    }

    #[test]
    fn test_unknown_injector() {
        let err = assert_err!(resolve(None, &[(ENV_INJECTOR, "screen")]));
        assert!(matches!(err, ConfigError::UnknownInjector(kind) if kind == "screen"));
    }

    #[test]
    fn test_empty_explicit_url() {
        assert!(matches!(
            resolve(Some(" "), &[]),
            Err(ConfigError::Empty(_))
        ));
    }

    #[test]
    fn test_channel_options_follow_config() {
        let config = BridgeConfig {
            reconnect_delay: Duration::from_millis(7),
            send_timeout: Duration::from_millis(9),
            ..BridgeConfig::default()
        };
        let options = config.channel_options();
        assert_eq!(options.url, config.url);
        assert_eq!(options.reconnect_delay, Duration::from_millis(7));
        assert_eq!(options.send_timeout, Duration::from_millis(9));
        assert_eq!(options.ping_timeout, Duration::from_secs(20));
    }
}
