//! Reconnecting channel actor
//!
//! One tokio task owns the transport and all session state; callers hold
//! a cloneable [`ChannelHandle`] and read [`ChannelEvent`]s from an mpsc
//! receiver. Serializing every mutation through the actor's command
//! queue is what makes the ordering guarantee hold even when a caller
//! sends from inside its handling of the open notification.

use super::message::ChannelMessage;
use super::session::{ChannelSession, SessionEffect, SessionInput};
use super::transport::{Connection, Transport};
use crate::config::defaults::RECONNECT_BACKOFF_MS;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Tuning for one channel instance.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Fixed delay between reconnect attempts. Retries continue
    /// indefinitely at this interval; resilience over giving up is the
    /// documented policy for field devices on flaky mobile links.
    pub reconnect_backoff: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_millis(RECONNECT_BACKOFF_MS),
        }
    }
}

/// Notifications surfaced to the channel's owner.
///
/// `Open` doubles as the "reconnected" confirmation; its generation
/// lets the caller detect a fresh connection without tracking queue
/// state. `ConnectionLost` fires once per disconnect episode.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Open { generation: u64 },
    Message(ChannelMessage),
    ConnectionLost,
}

enum Command {
    Send(ChannelMessage),
    Close,
}

struct Shared {
    connected: AtomicBool,
    generation: AtomicU64,
}

/// Cloneable handle to a running channel actor.
#[derive(Clone)]
pub struct ChannelHandle {
    cmd_tx: mpsc::UnboundedSender<Command>,
    shared: Arc<Shared>,
}

impl ChannelHandle {
    /// Send a message to the peer.
    ///
    /// Transmits immediately while connected; otherwise the message
    /// joins an unbounded FIFO queue and is flushed, in original send
    /// order, right after the next successful connection. Nothing is
    /// dropped except on [`close`](Self::close).
    pub fn send(&self, message: ChannelMessage) {
        let _ = self.cmd_tx.send(Command::Send(message));
    }

    /// Tear the channel down. Cancels any pending reconnect, closes the
    /// transport and silences all further events.
    pub fn close(&self) {
        let _ = self.cmd_tx.send(Command::Close);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    /// Generation of the most recent successful connection. Strictly
    /// increases on each reconnect; 0 before the first connect.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }
}

/// Factory for channel actors.
pub struct TrackingChannel;

impl TrackingChannel {
    /// Spawn the actor and start connecting immediately.
    pub fn spawn<T: Transport>(
        transport: T,
        config: ChannelConfig,
    ) -> (ChannelHandle, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            connected: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        });

        let handle = ChannelHandle {
            cmd_tx,
            shared: Arc::clone(&shared),
        };

        tokio::spawn(run_channel(transport, config, cmd_rx, event_tx, shared));

        (handle, event_rx)
    }
}

enum LoopExit {
    Closed,
    TransportFailed,
}

async fn run_channel<T: Transport>(
    transport: T,
    config: ChannelConfig,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    shared: Arc<Shared>,
) {
    let mut session = ChannelSession::new();

    loop {
        session.apply(SessionInput::ConnectStarted);

        let Some(connect_result) = connect_accepting_commands(&transport, &mut cmd_rx, &mut session).await
        else {
            debug!("Channel closed while connecting");
            return;
        };

        let mut conn = match connect_result {
            Ok(conn) => conn,
            Err(e) => {
                warn!(
                    error = %e,
                    attempt = session.reconnect_attempts + 1,
                    "Channel connect failed"
                );
                if !fail_and_backoff(&mut session, &mut cmd_rx, &event_tx, &config).await {
                    return;
                }
                continue;
            }
        };

        // Opened: bump the generation, then flush the queue BEFORE the
        // open notification so queued messages precede anything the
        // caller sends from its open handler.
        let effect = session.apply(SessionInput::Opened);
        debug_assert_eq!(effect, SessionEffect::FlushAndNotifyOpen);

        if let Err(e) = flush_pending(&mut conn, &mut session).await {
            warn!(error = %e, queued = session.pending.len(), "Flush failed on fresh connection");
            if !fail_and_backoff(&mut session, &mut cmd_rx, &event_tx, &config).await {
                return;
            }
            continue;
        }

        shared.generation.store(session.generation, Ordering::SeqCst);
        shared.connected.store(true, Ordering::SeqCst);
        let _ = event_tx.send(ChannelEvent::Open {
            generation: session.generation,
        });
        info!(generation = session.generation, "Channel connected");

        let exit = connected_loop(&mut conn, &mut cmd_rx, &mut session, &event_tx).await;
        shared.connected.store(false, Ordering::SeqCst);

        match exit {
            LoopExit::Closed => {
                conn.shutdown().await;
                info!("Channel closed");
                return;
            }
            LoopExit::TransportFailed => {
                conn.shutdown().await;
                if !fail_and_backoff(&mut session, &mut cmd_rx, &event_tx, &config).await {
                    return;
                }
            }
        }
    }
}

/// Drive the transport connect while still accepting commands, so sends
/// issued before the first connection queue up and close stays
/// responsive. `None` means the channel was closed.
async fn connect_accepting_commands<T: Transport>(
    transport: &T,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    session: &mut ChannelSession,
) -> Option<Result<T::Conn, super::transport::TransportError>> {
    let connect = transport.connect();
    tokio::pin!(connect);
    loop {
        tokio::select! {
            res = &mut connect => return Some(res),
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => session.pending.push_back(msg),
                Some(Command::Close) | None => {
                    session.apply(SessionInput::CloseRequested);
                    return None;
                }
            }
        }
    }
}

/// Record the failure, surface the one-time loss notification, then wait
/// out the backoff. Returns false if the channel was closed meanwhile.
async fn fail_and_backoff(
    session: &mut ChannelSession,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    event_tx: &mpsc::UnboundedSender<ChannelEvent>,
    config: &ChannelConfig,
) -> bool {
    if let SessionEffect::ScheduleReconnect { notify_loss } =
        session.apply(SessionInput::TransportFailed)
    {
        if notify_loss {
            let _ = event_tx.send(ChannelEvent::ConnectionLost);
        }
    }

    let sleep = tokio::time::sleep(config.reconnect_backoff);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            () = &mut sleep => {
                session.apply(SessionInput::BackoffElapsed);
                return true;
            }
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => session.pending.push_back(msg),
                Some(Command::Close) | None => {
                    session.apply(SessionInput::CloseRequested);
                    return false;
                }
            }
        }
    }
}

/// Drain the pending queue in FIFO order. On a write failure the
/// unsent message goes back to the front so nothing is lost.
async fn flush_pending<C: Connection>(
    conn: &mut C,
    session: &mut ChannelSession,
) -> Result<(), super::transport::TransportError> {
    while let Some(msg) = session.pending.pop_front() {
        let frame = match msg.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, kind = %msg.kind, "Dropping unencodable queued message");
                continue;
            }
        };
        if let Err(e) = conn.send_frame(&frame).await {
            session.pending.push_front(msg);
            return Err(e);
        }
    }
    Ok(())
}

async fn connected_loop<C: Connection>(
    conn: &mut C,
    cmd_rx: &mut mpsc::UnboundedReceiver<Command>,
    session: &mut ChannelSession,
    event_tx: &mpsc::UnboundedSender<ChannelEvent>,
) -> LoopExit {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(Command::Send(msg)) => {
                    let frame = match msg.to_frame() {
                        Ok(frame) => frame,
                        Err(e) => {
                            warn!(error = %e, kind = %msg.kind, "Dropping unencodable message");
                            continue;
                        }
                    };
                    if let Err(e) = conn.send_frame(&frame).await {
                        warn!(error = %e, "Send failed — message re-queued for retry");
                        session.pending.push_front(msg);
                        return LoopExit::TransportFailed;
                    }
                }
                Some(Command::Close) | None => {
                    session.apply(SessionInput::CloseRequested);
                    return LoopExit::Closed;
                }
            },
            frame = conn.recv_frame() => match frame {
                Ok(Some(line)) => match ChannelMessage::from_frame(&line) {
                    Ok(msg) if msg.is_heartbeat_ping() => {
                        let Ok(pong) = ChannelMessage::heartbeat_pong().to_frame() else {
                            continue;
                        };
                        if let Err(e) = conn.send_frame(&pong).await {
                            warn!(error = %e, "Heartbeat pong failed");
                            return LoopExit::TransportFailed;
                        }
                    }
                    // Stray pongs carry no information for the client.
                    Ok(msg) if msg.is_heartbeat_pong() => {}
                    Ok(msg) => {
                        let _ = event_tx.send(ChannelEvent::Message(msg));
                    }
                    Err(e) => {
                        warn!(error = %e, "Dropping undecodable inbound frame");
                    }
                },
                Ok(None) => {
                    warn!("Channel closed by peer");
                    return LoopExit::TransportFailed;
                }
                Err(e) => {
                    warn!(error = %e, "Channel transport error");
                    return LoopExit::TransportFailed;
                }
            }
        }
    }
}
