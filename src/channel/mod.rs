//! Realtime transport channel
//!
//! A persistent, self-healing connection between a field device and the
//! hub. Messages are line-framed JSON; sends issued while disconnected
//! queue up and flush in order on reconnect. Split into a pure state
//! machine ([`session`]), a transport seam ([`transport`]) and the actor
//! that ties them together ([`client`]).

mod client;
mod message;
mod session;
mod transport;

pub use client::{ChannelConfig, ChannelEvent, ChannelHandle, TrackingChannel};
pub use message::{ChannelMessage, FrameError, HEARTBEAT_PING, HEARTBEAT_PONG};
pub use session::{ChannelSession, ChannelState, SessionEffect, SessionInput};
pub use transport::{
    Connection, TcpConnection, TcpTransport, Transport, TransportError, DEFAULT_CONNECT_TIMEOUT,
};
