//! Reconnecting WebSocket channel to the bridge endpoint.
//!
//! One connection at a time. Each connection runs a reader task (inbound
//! frames → command queue) and a writer loop that owns the socket sink, so
//! every outbound frame goes through a single ordered path. When the
//! connection is lost, both are torn down and rebuilt after a fixed delay,
//! forever. Commands are executed by one dispatch task that lives as long as
//! the channel, so a connection loss never interrupts an injection.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use futures::{Sink, SinkExt, Stream, StreamExt};
use thiserror::Error;
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use turnbridge_core::Turn;
use uuid::Uuid;

use crate::dispatch::CommandDispatcher;
use crate::protocol::{Inbound, OutboundMessage};

type WsError = tokio_tungstenite::tungstenite::Error;

/// Default endpoint when nothing else is configured.
pub const DEFAULT_URL: &str = "ws://localhost:8765";

/// Upper bound on delivering the Close frame at shutdown.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

/// Channel error.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),
    #[error("Connect timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("No keep-alive acknowledgement within {0:?}")]
    KeepaliveTimeout(Duration),
    #[error("Send did not complete within {0:?}")]
    SendTimeout(Duration),
    #[error("Connection closed by peer")]
    Closed,
}

/// Connection settings.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    /// Endpoint URL (`ws://` or `wss://`).
    pub url: String,
    /// Pause between a connection loss and the next attempt.
    pub reconnect_delay: Duration,
    /// How often to ping the endpoint.
    pub ping_interval: Duration,
    /// How long to wait for a ping to be answered.
    pub ping_timeout: Duration,
    /// Upper bound on establishing a connection.
    pub connect_timeout: Duration,
    /// Upper bound on writing one frame. A peer that stops reading is
    /// treated as lost once this passes.
    pub send_timeout: Duration,
}

impl ChannelOptions {
    /// Options for `url` with the default timings.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reconnect_delay: Duration::from_secs(5),
            ping_interval: Duration::from_secs(20),
            ping_timeout: Duration::from_secs(20),
            connect_timeout: Duration::from_secs(10),
            send_timeout: Duration::from_secs(20),
        }
    }
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self::new(DEFAULT_URL)
    }
}

/// Sealed turns waiting to be transmitted, in completion order.
///
/// Outlives individual connections: turns sealed while disconnected stay
/// here until a connection accepts them.
#[derive(Debug)]
pub struct TurnOutbox {
    rx: mpsc::UnboundedReceiver<Turn>,
    pending: VecDeque<Turn>,
    open: bool,
}

impl TurnOutbox {
    /// Create an outbox and the sender the parser side feeds.
    #[must_use]
    pub fn channel() -> (mpsc::UnboundedSender<Turn>, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self::new(rx))
    }

    /// Wrap an existing receiver.
    #[must_use]
    pub const fn new(rx: mpsc::UnboundedReceiver<Turn>) -> Self {
        Self {
            rx,
            pending: VecDeque::new(),
            open: true,
        }
    }

    /// Turns received but not yet transmitted.
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Wait for at least one new turn. Returns false once the sender is gone.
    async fn fill(&mut self) -> bool {
        match self.rx.recv().await {
            Some(turn) => {
                self.pending.push_back(turn);
                while let Ok(turn) = self.rx.try_recv() {
                    self.pending.push_back(turn);
                }
                true
            }
            None => {
                self.open = false;
                false
            }
        }
    }

    fn front(&self) -> Option<&Turn> {
        self.pending.front()
    }

    fn mark_sent(&mut self) {
        self.pending.pop_front();
    }
}

/// Outcome of a send raced against shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Sent {
    Done,
    Cancelled,
}

/// Channel-lifetime queues shared by every connection.
struct Queues {
    commands: mpsc::UnboundedSender<Inbound>,
    replies: mpsc::UnboundedReceiver<OutboundMessage>,
}

/// Persistent, reconnecting channel to the bridge endpoint.
pub struct BridgeChannel {
    options: ChannelOptions,
    dispatcher: Arc<CommandDispatcher>,
}

impl BridgeChannel {
    /// Create a channel. Nothing connects until [`Self::run`].
    #[must_use]
    pub fn new(options: ChannelOptions, dispatcher: Arc<CommandDispatcher>) -> Self {
        Self {
            options,
            dispatcher,
        }
    }

    /// Connection settings.
    #[must_use]
    pub const fn options(&self) -> &ChannelOptions {
        &self.options
    }

    /// Connect, serve and reconnect until `shutdown` is cancelled.
    ///
    /// Replies produced while disconnected go out on the next connection.
    pub async fn run(&self, mut outbox: TurnOutbox, shutdown: CancellationToken) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let dispatch = tokio::spawn(dispatch_loop(
            Arc::clone(&self.dispatcher),
            command_rx,
            reply_tx,
            shutdown.clone(),
        ));
        let mut queues = Queues {
            commands: command_tx,
            replies: reply_rx,
        };

        loop {
            match self.serve_once(&mut outbox, &mut queues, &shutdown).await {
                Ok(()) => break,
                Err(e) => tracing::warn!(
                    url = %self.options.url,
                    error = %e,
                    pending = outbox.pending_len(),
                    retry_in = ?self.options.reconnect_delay,
                    "Bridge connection lost"
                ),
            }

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.options.reconnect_delay) => {}
            }
        }

        drop(queues);
        if let Err(e) = dispatch.await {
            tracing::error!(error = %e, "Dispatch task failed");
        }
        tracing::info!("Bridge channel stopped");
    }

    /// One connection lifetime. `Ok` means shutdown was requested.
    async fn serve_once(
        &self,
        outbox: &mut TurnOutbox,
        queues: &mut Queues,
        shutdown: &CancellationToken,
    ) -> Result<(), ChannelError> {
        let timeout = self.options.connect_timeout;
        let connect = tokio::time::timeout(timeout, connect_async(self.options.url.as_str()));
        let (socket, _) = tokio::select! {
            () = shutdown.cancelled() => return Ok(()),
            res = connect => res.map_err(|_| ChannelError::ConnectTimeout(timeout))??,
        };

        let conn_id = Uuid::new_v4();
        tracing::info!(%conn_id, url = %self.options.url, "Connected to bridge endpoint");

        let (mut sink, stream) = socket.split();
        let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();

        let mut reader = tokio::spawn(read_loop(stream, queues.commands.clone(), pong_tx));

        let result = self
            .write_loop(
                &mut sink,
                &mut reader,
                &mut queues.replies,
                &mut pong_rx,
                outbox,
                shutdown,
            )
            .await;
        reader.abort();

        if result.is_ok() {
            let limit = self.options.send_timeout.min(CLOSE_GRACE);
            match tokio::time::timeout(limit, sink.send(Message::Close(None))).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::debug!(%conn_id, error = %e, "Close frame not delivered"),
                Err(_) => tracing::debug!(%conn_id, "Close frame timed out"),
            }
        }
        tracing::info!(%conn_id, "Disconnected from bridge endpoint");
        result
    }

    async fn write_loop<S>(
        &self,
        sink: &mut S,
        reader: &mut JoinHandle<Result<(), ChannelError>>,
        replies: &mut mpsc::UnboundedReceiver<OutboundMessage>,
        pong_rx: &mut mpsc::UnboundedReceiver<()>,
        outbox: &mut TurnOutbox,
        shutdown: &CancellationToken,
    ) -> Result<(), ChannelError>
    where
        S: Sink<Message, Error = WsError> + Unpin,
    {
        let limit = self.options.send_timeout;
        let ping_every = self.options.ping_interval;
        let mut ping = tokio::time::interval_at(Instant::now() + ping_every, ping_every);
        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ack_deadline: Option<Instant> = None;

        loop {
            while let Some(turn) = outbox.front() {
                let frame = OutboundMessage::Response(turn.clone());
                if send_message(sink, &frame, limit, shutdown).await? == Sent::Cancelled {
                    return Ok(());
                }
                tracing::info!(options = turn.options.len(), "Sent turn");
                outbox.mark_sent();
            }

            let accepting_turns = outbox.open;
            let deadline = ack_deadline;

            tokio::select! {
                biased;

                () = shutdown.cancelled() => return Ok(()),

                joined = &mut *reader => {
                    return Err(match joined {
                        Ok(Err(e)) => e,
                        Ok(Ok(())) | Err(_) => ChannelError::Closed,
                    });
                }

                () = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    return Err(ChannelError::KeepaliveTimeout(self.options.ping_timeout));
                }

                Some(()) = pong_rx.recv() => ack_deadline = None,

                more = outbox.fill(), if accepting_turns => {
                    if !more {
                        tracing::debug!("Turn source closed");
                    }
                }

                Some(reply) = replies.recv() => {
                    if send_message(sink, &reply, limit, shutdown).await? == Sent::Cancelled {
                        return Ok(());
                    }
                }

                _ = ping.tick() => {
                    if ack_deadline.is_none() {
                        let sent = send_frame(sink, Message::Ping(Vec::new()), limit, shutdown).await?;
                        if sent == Sent::Cancelled {
                            return Ok(());
                        }
                        ack_deadline = Some(Instant::now() + self.options.ping_timeout);
                    }
                }
            }
        }
    }
}

/// Write one frame, giving up after `limit` or when `shutdown` fires.
async fn send_frame<S>(
    sink: &mut S,
    frame: Message,
    limit: Duration,
    shutdown: &CancellationToken,
) -> Result<Sent, ChannelError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    tokio::select! {
        biased;
        () = shutdown.cancelled() => Ok(Sent::Cancelled),
        res = tokio::time::timeout(limit, sink.send(frame)) => match res {
            Ok(sent) => sent.map(|()| Sent::Done).map_err(ChannelError::from),
            Err(_) => Err(ChannelError::SendTimeout(limit)),
        },
    }
}

async fn send_message<S>(
    sink: &mut S,
    msg: &OutboundMessage,
    limit: Duration,
    shutdown: &CancellationToken,
) -> Result<Sent, ChannelError>
where
    S: Sink<Message, Error = WsError> + Unpin,
{
    let json = match msg.to_json() {
        Ok(j) => j,
        Err(e) => {
            tracing::error!("Failed to serialize message: {e}");
            return Ok(Sent::Done);
        }
    };
    send_frame(sink, Message::Text(json), limit, shutdown).await
}

/// Executes commands one at a time, independent of any connection.
async fn dispatch_loop(
    dispatcher: Arc<CommandDispatcher>,
    mut commands: mpsc::UnboundedReceiver<Inbound>,
    replies: mpsc::UnboundedSender<OutboundMessage>,
    shutdown: CancellationToken,
) {
    loop {
        let inbound = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            inbound = commands.recv() => match inbound {
                Some(inbound) => inbound,
                None => break,
            },
        };

        if let Some(reply) = dispatcher.handle(inbound).await {
            if replies.send(reply).is_err() {
                break;
            }
        }
    }
}

/// Inbound half: decode frames, queue commands, report pongs.
async fn read_loop<S>(
    mut stream: S,
    commands: mpsc::UnboundedSender<Inbound>,
    pongs: mpsc::UnboundedSender<()>,
) -> Result<(), ChannelError>
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = stream.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Binary(data) => match String::from_utf8(data) {
                Ok(s) => s,
                Err(_) => {
                    tracing::warn!("Dropping non-UTF-8 binary frame");
                    continue;
                }
            },
            Message::Pong(_) => {
                let _ = pongs.send(());
                continue;
            }
            Message::Close(frame) => {
                tracing::info!(?frame, "Endpoint closed the connection");
                break;
            }
            Message::Ping(_) | Message::Frame(_) => continue,
        };

        match Inbound::decode(&text) {
            Ok(inbound) => {
                if commands.send(inbound).is_err() {
                    break;
                }
            }
            Err(e) => {
                let preview: String = text.chars().take(50).collect();
                tracing::warn!(error = %e, frame = %preview, "Dropping malformed message");
            }
        }
    }
    Ok(())
}
