//! Channel session state machine
//!
//! All connection-state transitions are centralized in
//! [`ChannelSession::apply`], keeping the actor's I/O loop free of
//! scattered boolean flags and making the transition table unit-testable
//! without a socket.

use super::message::ChannelMessage;
use std::collections::VecDeque;

/// Connection state of a logical channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelState {
    /// Initial state, before the first connect attempt.
    #[default]
    Disconnected,
    /// A transport connect is in flight.
    Connecting,
    Connected,
    /// Waiting out the backoff delay before the next connect.
    Reconnecting,
    /// Terminal: caller-initiated close. No further transitions.
    Closed,
}

/// Inputs that drive session transitions. Produced by the actor's I/O
/// loop, never by callers directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// A connect attempt is starting.
    ConnectStarted,
    /// The transport opened successfully.
    Opened,
    /// Connect failed, or an established connection dropped.
    TransportFailed,
    /// The backoff delay elapsed.
    BackoffElapsed,
    /// The caller requested close.
    CloseRequested,
}

/// What the actor must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEffect {
    None,
    /// Flush the pending queue in FIFO order, then surface the open
    /// notification. Flush-before-notify is what guarantees queued
    /// messages precede anything sent from the open handler.
    FlushAndNotifyOpen,
    /// Schedule the reconnect backoff; surface the one-time connection
    /// lost notification iff `notify_loss`.
    ScheduleReconnect { notify_loss: bool },
    /// Close the transport and stop the actor.
    Teardown,
}

/// Mutable state of one logical channel instance.
///
/// Created on first connect, mutated only by the channel actor,
/// destroyed on intentional teardown.
#[derive(Debug, Default)]
pub struct ChannelSession {
    pub state: ChannelState,
    /// Strictly increases on each successful (re)connection.
    pub generation: u64,
    /// Messages accepted while not connected, flushed FIFO on open.
    pub pending: VecDeque<ChannelMessage>,
    /// Consecutive failed attempts since the last successful connect.
    pub reconnect_attempts: u32,
    /// Whether the current disconnect episode has already been surfaced.
    loss_notified: bool,
}

impl ChannelSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn is_connected(&self) -> bool {
        matches!(self.state, ChannelState::Connected)
    }

    pub const fn is_closed(&self) -> bool {
        matches!(self.state, ChannelState::Closed)
    }

    /// Apply one input and return the effect the actor must perform.
    ///
    /// Inputs arriving after close are swallowed — a late transport
    /// close event must not resurrect the channel.
    pub fn apply(&mut self, input: SessionInput) -> SessionEffect {
        if self.is_closed() {
            return SessionEffect::None;
        }

        match input {
            SessionInput::ConnectStarted => {
                self.state = ChannelState::Connecting;
                SessionEffect::None
            }
            SessionInput::Opened => {
                self.state = ChannelState::Connected;
                self.generation += 1;
                self.reconnect_attempts = 0;
                self.loss_notified = false;
                SessionEffect::FlushAndNotifyOpen
            }
            SessionInput::TransportFailed => {
                self.state = ChannelState::Reconnecting;
                self.reconnect_attempts = self.reconnect_attempts.saturating_add(1);
                let notify_loss = !self.loss_notified;
                self.loss_notified = true;
                SessionEffect::ScheduleReconnect { notify_loss }
            }
            SessionInput::BackoffElapsed => {
                self.state = ChannelState::Connecting;
                SessionEffect::None
            }
            SessionInput::CloseRequested => {
                self.state = ChannelState::Closed;
                SessionEffect::Teardown
            }
        }
    }
}
