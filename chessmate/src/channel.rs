// Persistent channel to the authority: lifecycle, reconnect, event pump.
//
// Split in two layers so the reconnect policy is testable without a network:
//
// - `LinkFsm` is a pure state machine. Every transition is a function of
//   (current state, event) and returns at most one effect for the driver to
//   execute. The attempt counter and backoff arithmetic live here.
// - `run` is the async driver. It owns at most one WebSocket at a time,
//   feeds connection outcomes into the FSM, and interprets the effects:
//   opening the socket, sleeping out a retry delay, or giving up.
//
// Retry policy: involuntary loss or a failed connect schedules a retry after
// `base_delay * 2^attempts` (counter incremented after the delay is
// computed, so the first retry waits exactly `base_delay`). After
// `max_attempts` consecutive failures the manager goes idle and stays there
// until a manual connect, which also resets the counter. A manual
// disconnect cancels any pending retry.

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{info, warn};

use crate::protocol::{ChannelCommand, ChannelEvent, DisconnectReason, ServerEvent};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket endpoint, e.g. `ws://127.0.0.1:5000/events`.
    pub url: String,
    /// Bound on a single connection attempt.
    pub connect_timeout: Duration,
    /// First-retry delay; doubles on every consecutive failure.
    pub base_delay: Duration,
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
}

// ---------------------------------------------------------------------------
// Link state machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Idle,
    Connecting,
    Connected,
    AwaitingRetry,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    /// Manual connect request (mount or user command).
    ConnectRequested,
    /// The socket opened.
    Opened,
    /// The connection attempt failed.
    ConnectFailed,
    /// The live channel dropped involuntarily.
    ChannelLost,
    /// The retry timer fired.
    RetryDue,
    /// Manual disconnect; suppresses auto-retry.
    ManualDisconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEffect {
    /// Start a connection attempt.
    OpenChannel,
    /// Wait this long, then feed `RetryDue`.
    ScheduleRetry(Duration),
    /// Retries exhausted; surface the terminal disconnected condition.
    GiveUp,
}

/// Reconnect policy as a pure state machine.
#[derive(Debug, Clone)]
pub struct LinkFsm {
    state: LinkState,
    attempts: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl LinkFsm {
    pub fn new(base_delay: Duration, max_attempts: u32) -> LinkFsm {
        LinkFsm {
            state: LinkState::Idle,
            attempts: 0,
            max_attempts,
            base_delay,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Advance the machine. Returns the effect the driver must execute, if
    /// any. Unexpected (state, event) pairs are ignored.
    pub fn on_event(&mut self, event: LinkEvent) -> Option<LinkEffect> {
        use LinkEvent::*;
        use LinkState::*;

        match (self.state, event) {
            // Manual connect: from idle, or jumping a pending retry timer.
            // Either way the attempt counter starts over.
            (Idle | AwaitingRetry, ConnectRequested) => {
                self.attempts = 0;
                self.state = Connecting;
                Some(LinkEffect::OpenChannel)
            }
            // Already connected or connecting: connect is a no-op.
            (Connecting | Connected, ConnectRequested) => None,

            (Connecting, Opened) => {
                self.attempts = 0;
                self.state = Connected;
                None
            }

            (Connecting, ConnectFailed) | (Connected, ChannelLost) => self.retry_or_give_up(),

            (AwaitingRetry, RetryDue) => {
                self.state = Connecting;
                Some(LinkEffect::OpenChannel)
            }

            (_, ManualDisconnect) => {
                self.attempts = 0;
                self.state = Idle;
                None
            }

            _ => None,
        }
    }

    fn retry_or_give_up(&mut self) -> Option<LinkEffect> {
        if self.attempts < self.max_attempts {
            let delay = self.backoff_delay();
            // Incremented after the delay is computed: the first retry waits
            // base_delay * 2^0.
            self.attempts += 1;
            self.state = LinkState::AwaitingRetry;
            Some(LinkEffect::ScheduleRetry(delay))
        } else {
            self.state = LinkState::Idle;
            Some(LinkEffect::GiveUp)
        }
    }

    fn backoff_delay(&self) -> Duration {
        let shift = self.attempts.min(31);
        self.base_delay.saturating_mul(1u32 << shift)
    }
}

// ---------------------------------------------------------------------------
// Driver task
// ---------------------------------------------------------------------------

/// Why `drive_channel` stopped reading a live socket.
#[derive(Debug, PartialEq)]
pub enum SocketEnd {
    /// A `Disconnect` command arrived.
    Manual,
    /// A `Shutdown` command arrived or the command channel closed.
    Shutdown,
    /// The event receiver was dropped; nobody is listening.
    ReceiverGone,
    /// The channel dropped involuntarily.
    Lost(DisconnectReason),
}

/// Run the channel manager until shutdown.
///
/// Owns at most one socket at a time. Commands arrive on `cmd_rx`; channel
/// lifecycle events and parsed server pushes go out through `event_tx`.
pub async fn run(
    cfg: ChannelConfig,
    mut cmd_rx: mpsc::Receiver<ChannelCommand>,
    event_tx: mpsc::Sender<ChannelEvent>,
) -> anyhow::Result<()> {
    let mut fsm = LinkFsm::new(cfg.base_delay, cfg.max_attempts);

    'idle: loop {
        // Idle: nothing to do until someone asks for a connection.
        let cmd = match cmd_rx.recv().await {
            Some(cmd) => cmd,
            None => return Ok(()),
        };
        match cmd {
            ChannelCommand::Connect => {
                if fsm.on_event(LinkEvent::ConnectRequested) != Some(LinkEffect::OpenChannel) {
                    continue 'idle;
                }
            }
            ChannelCommand::Disconnect => continue 'idle,
            ChannelCommand::Shutdown => return Ok(()),
        }

        // One session: connect, pump, retry with backoff, until the link is
        // manually stopped or retries run out.
        'session: loop {
            if event_tx
                .send(ChannelEvent::Connecting {
                    attempt: fsm.attempts(),
                })
                .await
                .is_err()
            {
                return Ok(());
            }

            let effect = match open_channel(&cfg).await {
                Ok(socket) => {
                    let _ = fsm.on_event(LinkEvent::Opened);
                    info!("channel connected to {}", cfg.url);
                    if event_tx.send(ChannelEvent::Connected).await.is_err() {
                        return Ok(());
                    }

                    let (mut write, read) = socket.split();
                    match drive_channel(read, &mut cmd_rx, &event_tx).await {
                        SocketEnd::Manual => {
                            let _ = write.close().await;
                            let _ = fsm.on_event(LinkEvent::ManualDisconnect);
                            info!("channel closed on user request");
                            let _ = event_tx
                                .send(ChannelEvent::Disconnected {
                                    reason: DisconnectReason::Manual,
                                })
                                .await;
                            continue 'idle;
                        }
                        SocketEnd::Shutdown => {
                            let _ = write.close().await;
                            return Ok(());
                        }
                        SocketEnd::ReceiverGone => return Ok(()),
                        SocketEnd::Lost(reason) => {
                            let effect = fsm.on_event(LinkEvent::ChannelLost);
                            if event_tx
                                .send(ChannelEvent::Disconnected { reason })
                                .await
                                .is_err()
                            {
                                return Ok(());
                            }
                            effect
                        }
                    }
                }
                Err(err) => {
                    warn!("connection attempt failed: {err}");
                    let effect = fsm.on_event(LinkEvent::ConnectFailed);
                    if event_tx
                        .send(ChannelEvent::Disconnected {
                            reason: DisconnectReason::ConnectFailed(err.to_string()),
                        })
                        .await
                        .is_err()
                    {
                        return Ok(());
                    }
                    effect
                }
            };

            match effect {
                Some(LinkEffect::ScheduleRetry(delay)) => {
                    info!(
                        "scheduling reconnect attempt {} in {:?}",
                        fsm.attempts(),
                        delay
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            let _ = fsm.on_event(LinkEvent::RetryDue);
                            continue 'session;
                        }
                        cmd = cmd_rx.recv() => match cmd {
                            Some(ChannelCommand::Connect) => {
                                // Jump the timer; counter starts over.
                                let _ = fsm.on_event(LinkEvent::ConnectRequested);
                                continue 'session;
                            }
                            Some(ChannelCommand::Disconnect) => {
                                let _ = fsm.on_event(LinkEvent::ManualDisconnect);
                                info!("pending reconnect cancelled on user request");
                                continue 'idle;
                            }
                            Some(ChannelCommand::Shutdown) | None => return Ok(()),
                        }
                    }
                }
                Some(LinkEffect::GiveUp) => {
                    warn!("reconnect attempts exhausted after {} tries", cfg.max_attempts);
                    if event_tx.send(ChannelEvent::RetriesExhausted).await.is_err() {
                        return Ok(());
                    }
                    continue 'idle;
                }
                _ => continue 'idle,
            }
        }
    }
}

async fn open_channel(cfg: &ChannelConfig) -> anyhow::Result<WsStream> {
    let attempt = connect_async(cfg.url.as_str());
    let (socket, _response) = tokio::time::timeout(cfg.connect_timeout, attempt)
        .await
        .map_err(|_| anyhow::anyhow!("connect timed out after {:?}", cfg.connect_timeout))??;
    Ok(socket)
}

/// Pump frames from a live channel, forwarding parsed [`ServerEvent`]s.
///
/// Generic over the frame stream so tests can feed in-memory fixtures
/// without opening sockets. Unparseable text frames are logged and dropped;
/// a bad frame must not take the channel down.
pub async fn drive_channel<St>(
    mut frames: St,
    cmd_rx: &mut mpsc::Receiver<ChannelCommand>,
    event_tx: &mpsc::Sender<ChannelEvent>,
) -> SocketEnd
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    loop {
        tokio::select! {
            frame = frames.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    match serde_json::from_str::<ServerEvent>(text.as_str()) {
                        Ok(event) => {
                            if event_tx.send(ChannelEvent::Push(event)).await.is_err() {
                                return SocketEnd::ReceiverGone;
                            }
                        }
                        Err(err) => warn!("ignoring unparseable channel frame: {err}"),
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("authority sent close frame");
                    return SocketEnd::Lost(DisconnectReason::TransportClosed);
                }
                Some(Ok(_)) => {
                    // Binary, Ping, Pong, Frame: nothing for us in these.
                }
                Some(Err(err)) => {
                    warn!("channel read error: {err}");
                    return SocketEnd::Lost(DisconnectReason::TransportError(err.to_string()));
                }
                None => {
                    info!("channel stream ended");
                    return SocketEnd::Lost(DisconnectReason::TransportClosed);
                }
            },
            cmd = cmd_rx.recv() => match cmd {
                Some(ChannelCommand::Disconnect) => return SocketEnd::Manual,
                Some(ChannelCommand::Connect) => {
                    // Already connected: no-op.
                }
                Some(ChannelCommand::Shutdown) | None => return SocketEnd::Shutdown,
            }
        }
    }
}
