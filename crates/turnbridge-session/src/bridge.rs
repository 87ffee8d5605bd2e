//! Bridge orchestration: transcript → parser → channel, and commands back.
//!
//! Two tasks share one cancellation token. The transcript task owns the
//! parser outright; the channel task only sees sealed turns (through the
//! outbox) and the latest menu (through a watch channel).

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use turnbridge_core::{KeystrokeInjector, ParseEvent, Turn, TurnParser};
use turnbridge_inject::{ProcTtyLocator, TmuxInjector, TtyTypist};
use turnbridge_transport::{BridgeChannel, CommandDispatcher, TurnOutbox};

use crate::config::{BridgeConfig, InjectorKind};
use crate::snapshot::SnapshotMirror;
use crate::tailer::{TailError, TranscriptTailer};

/// Bridge error.
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Transcript error: {0}")]
    Tail(#[from] TailError),
    #[error("Transcript task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Build the configured keystroke injector.
#[must_use]
pub fn build_injector(config: &BridgeConfig) -> Arc<dyn KeystrokeInjector> {
    match config.injector {
        InjectorKind::Tmux => Arc::new(
            TmuxInjector::new(&config.tmux_session).with_timeout(config.injector_timeout),
        ),
        InjectorKind::Tty => Arc::new(
            TtyTypist::new(Arc::new(ProcTtyLocator::default()), &config.tty_process)
                .with_char_delay(config.char_delay),
        ),
    }
}

/// Run the bridge until `shutdown` is cancelled.
///
/// # Errors
/// Returns error if the transcript cannot be opened or read.
pub async fn run(config: BridgeConfig, shutdown: CancellationToken) -> Result<(), BridgeError> {
    let tailer = TranscriptTailer::open(&config.transcript_path, config.poll_delay).await?;

    let mirror = SnapshotMirror::new(&config.snapshot_path);
    if let Err(e) = mirror.reset().await {
        tracing::warn!(path = %mirror.path().display(), error = %e, "Failed to reset snapshot");
    }

    let (menu_tx, menu_rx) = watch::channel(None);
    let (turn_tx, outbox) = TurnOutbox::channel();
    let dispatcher = Arc::new(CommandDispatcher::new(build_injector(&config), menu_rx));
    let channel = BridgeChannel::new(config.channel_options(), dispatcher);

    let pump = TurnPump::new(mirror, turn_tx, menu_tx);
    let transcript = tokio::spawn(pump.follow(tailer, shutdown.clone()));

    tracing::info!(
        url = %config.url,
        injector = ?config.injector,
        "Bridge started"
    );
    channel.run(outbox, shutdown.clone()).await;

    transcript.await?
}

/// Feeds transcript lines through the parser and publishes the results.
pub struct TurnPump {
    parser: TurnParser,
    mirror: SnapshotMirror,
    turns: mpsc::UnboundedSender<Turn>,
    menu: watch::Sender<Option<Turn>>,
}

impl TurnPump {
    /// Create a pump with a fresh parser.
    #[must_use]
    pub fn new(
        mirror: SnapshotMirror,
        turns: mpsc::UnboundedSender<Turn>,
        menu: watch::Sender<Option<Turn>>,
    ) -> Self {
        Self {
            parser: TurnParser::new(),
            mirror,
            turns,
            menu,
        }
    }

    /// Parser state so far.
    #[must_use]
    pub const fn parser(&self) -> &TurnParser {
        &self.parser
    }

    /// Follow `tailer` until cancelled. A read failure cancels `shutdown` too.
    ///
    /// # Errors
    /// Returns error if the transcript cannot be read.
    pub async fn follow(
        mut self,
        mut tailer: TranscriptTailer,
        shutdown: CancellationToken,
    ) -> Result<(), BridgeError> {
        loop {
            let line = tokio::select! {
                () = shutdown.cancelled() => break,
                line = tailer.next_line() => line,
            };
            match line {
                Ok(line) => {
                    self.handle_line(&line).await;
                }
                Err(e) => {
                    tracing::error!(path = %tailer.path().display(), error = %e, "Transcript lost");
                    shutdown.cancel();
                    return Err(e.into());
                }
            }
        }

        if let Some(turn) = self.parser.current() {
            tracing::debug!(text = %turn.text, "Unsealed turn left in snapshot only");
        }
        Ok(())
    }

    /// Process one raw transcript line.
    pub async fn handle_line(&mut self, raw: &str) -> ParseEvent {
        let event = self.parser.feed_raw(raw);
        if event == ParseEvent::Skipped {
            return event;
        }

        if let Err(e) = self.mirror.write(&self.parser.snapshot()).await {
            tracing::warn!(path = %self.mirror.path().display(), error = %e, "Snapshot write failed");
        }

        if let ParseEvent::Sealed(turn) = &event {
            tracing::info!(
                sealed = self.parser.log().len(),
                options = turn.options.len(),
                "Turn complete"
            );
            if self.turns.send(turn.clone()).is_err() {
                tracing::debug!("Channel gone, turn kept in log only");
            }
        }

        self.publish_menu();
        event
    }

    /// Expose the newest turn carrying a menu, preferring the one on screen.
    fn publish_menu(&self) {
        let latest = self
            .parser
            .current()
            .filter(|turn| turn.has_options())
            .or_else(|| self.parser.log().last_with_options());

        self.menu.send_if_modified(|menu| {
            if menu.as_ref() == latest {
                false
            } else {
                *menu = latest.cloned();
                true
            }
        });
    }
}
