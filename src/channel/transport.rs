//! Transport seam — how frames reach the peer
//!
//! The channel state machine is transport-agnostic; production uses
//! line-framed TCP. Tests substitute their own listener on a loopback
//! port, so no mock layer is needed.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Transport-level failures. These drive channel state transitions and
/// are never surfaced to callers as hard errors.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    #[error("connect timed out")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed by peer")]
    Closed,
}

/// Dials a peer and yields a framed duplex connection.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    type Conn: Connection;

    async fn connect(&self) -> Result<Self::Conn, TransportError>;
}

/// One established connection carrying line frames.
#[async_trait]
pub trait Connection: Send {
    /// Write one frame. The frame must not contain a newline.
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Read the next frame. `Ok(None)` means the peer closed cleanly.
    async fn recv_frame(&mut self) -> Result<Option<String>, TransportError>;

    /// Best-effort close of the underlying stream.
    async fn shutdown(&mut self);
}

/// Default connect timeout. The channel imposes no timeout of its own
/// beyond this; retry pacing comes from the reconnect backoff.
pub const DEFAULT_CONNECT_TIMEOUT: Duration =
    Duration::from_secs(crate::config::defaults::CONNECT_TIMEOUT_SECS);

/// TCP transport with keepalive, framing one message per line.
pub struct TcpTransport {
    addr: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

#[async_trait]
impl Transport for TcpTransport {
    type Conn = TcpConnection;

    async fn connect(&self) -> Result<TcpConnection, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| TransportError::Timeout)?
            .map_err(|e| TransportError::ConnectFailed(e.to_string()))?;

        // TCP keepalive so half-dead links are detected between frames.
        let sock_ref = socket2::SockRef::from(&stream);
        let keepalive = socket2::TcpKeepalive::new()
            .with_time(Duration::from_secs(30))
            .with_interval(Duration::from_secs(10));
        let _ = sock_ref.set_tcp_keepalive(&keepalive);

        let (read_half, write_half) = stream.into_split();
        Ok(TcpConnection {
            reader: BufReader::new(read_half),
            writer: write_half,
            line: String::with_capacity(256),
        })
    }
}

/// An established TCP connection with buffered line reads.
pub struct TcpConnection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    line: String,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn send_frame(&mut self, frame: &str) -> Result<(), TransportError> {
        self.writer.write_all(frame.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;
        Ok(())
    }

    async fn recv_frame(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            self.line.clear();
            let bytes = self.reader.read_line(&mut self.line).await?;
            if bytes == 0 {
                return Ok(None);
            }
            let trimmed = self.line.trim();
            // Skip blank keep-alive lines some proxies insert.
            if trimmed.is_empty() {
                continue;
            }
            return Ok(Some(trimmed.to_string()));
        }
    }

    async fn shutdown(&mut self) {
        let _ = self.writer.shutdown().await;
    }
}
