//! Keystroke injection through `tmux send-keys`.

use std::{process::Stdio, time::Duration};

use async_trait::async_trait;
use tokio::process::Command;
use turnbridge_core::{
    InjectError, KeystrokeInjector,
    traits::menu_steps,
};

use crate::resolve::resolve_executable_path;

/// Default upper bound on a single `tmux` invocation.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

/// Injects keystrokes into a named tmux session.
#[derive(Debug, Clone)]
pub struct TmuxInjector {
    session: String,
    program: String,
    timeout: Duration,
}

impl TmuxInjector {
    /// Create an injector targeting `session`.
    #[must_use]
    pub fn new(session: impl Into<String>) -> Self {
        Self {
            session: session.into(),
            program: "tmux".to_string(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    /// Use a different `tmux` executable.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Bound each invocation by `timeout`.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Target session name.
    #[must_use]
    pub fn session(&self) -> &str {
        &self.session
    }

    async fn run(&self, args: &[String]) -> Result<(), InjectError> {
        let program = resolve_executable_path(&self.program)
            .await
            .ok_or_else(|| InjectError::Unavailable(format!("{} not found", self.program)))?;

        let mut cmd = Command::new(&program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => return Err(InjectError::TimedOut(self.timeout)),
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            Err(InjectError::Rejected(if stderr.is_empty() {
                format!("{} exited with {}", program.display(), output.status)
            } else {
                stderr
            }))
        }
    }
}

/// Arguments for typing `text` literally, then pressing Enter.
///
/// `--` ends option parsing, so text starting with `-` is still typed.
#[must_use]
pub fn submit_args(session: &str, text: &str) -> [Vec<String>; 2] {
    [
        vec![
            "send-keys".into(),
            "-t".into(),
            session.into(),
            "-l".into(),
            "--".into(),
            text.into(),
        ],
        vec![
            "send-keys".into(),
            "-t".into(),
            session.into(),
            "Enter".into(),
        ],
    ]
}

/// Arguments for moving down to the `index`-th menu entry and pressing Enter.
///
/// # Errors
/// Returns [`InjectError::InvalidIndex`] for index 0.
pub fn select_args(session: &str, index: u32) -> Result<Vec<String>, InjectError> {
    let steps = menu_steps(index)?;
    let mut args = vec!["send-keys".into(), "-t".into(), session.into()];
    args.extend((0..steps).map(|_| "Down".to_string()));
    args.push("Enter".into());
    Ok(args)
}

#[async_trait]
impl KeystrokeInjector for TmuxInjector {
    async fn submit_text(&self, text: &str) -> Result<(), InjectError> {
        for args in submit_args(&self.session, text) {
            self.run(&args).await?;
        }
        tracing::info!(session = %self.session, chars = text.chars().count(), "Injected text");
        Ok(())
    }

    async fn select_option(&self, index: u32) -> Result<(), InjectError> {
        let args = select_args(&self.session, index)?;
        self.run(&args).await?;
        tracing::info!(session = %self.session, index, "Selected menu option");
        Ok(())
    }
}
