//! Seams to the outside world: keystroke injection and terminal discovery.

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Injection error.
#[derive(Debug, Error)]
pub enum InjectError {
    #[error("Injector unavailable: {0}")]
    Unavailable(String),
    #[error("Injection target not found: {0}")]
    TargetNotFound(String),
    #[error("Injection rejected: {0}")]
    Rejected(String),
    #[error("Injection timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("Invalid option index: {0} (options are numbered from 1)")]
    InvalidIndex(u32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Drives the input side of the bridged program.
///
/// Implementations talk to an external control surface (a terminal
/// multiplexer, a TTY device) and report failure without retrying.
#[async_trait]
pub trait KeystrokeInjector: Send + Sync {
    /// Type `text` and confirm it as a new prompt.
    async fn submit_text(&self, text: &str) -> Result<(), InjectError>;

    /// Move to the `index`-th entry (1-based) of the on-screen menu and confirm.
    async fn select_option(&self, index: u32) -> Result<(), InjectError>;
}

/// Strategy for locating the controlling terminal of a running program.
pub trait TtyLocator: Send + Sync {
    /// Device path of the first matching process's terminal, if any.
    fn locate(&self, process_name: &str) -> Option<PathBuf>;
}

/// Number of cursor-down steps needed to reach a 1-based menu entry.
///
/// # Errors
/// Returns [`InjectError::InvalidIndex`] for index 0.
pub const fn menu_steps(index: u32) -> Result<u32, InjectError> {
    match index.checked_sub(1) {
        Some(steps) => Ok(steps),
        None => Err(InjectError::InvalidIndex(index)),
    }
}
