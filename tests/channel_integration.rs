//! Channel behavior against a real TCP peer.
//!
//! Covers the guarantees callers lean on: queued sends flush in order
//! across a reconnect, heartbeats never surface, and close is final.

use servitrack::channel::{
    ChannelConfig, ChannelEvent, ChannelMessage, TcpTransport, TrackingChannel,
};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

fn fast_config() -> ChannelConfig {
    ChannelConfig {
        reconnect_backoff: Duration::from_millis(100),
    }
}

struct ServerSide {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl ServerSide {
    async fn accept(listener: &TcpListener) -> Self {
        let (stream, _) = timeout(WAIT, listener.accept())
            .await
            .expect("accept timed out")
            .expect("accept failed");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn read_message(&mut self) -> ChannelMessage {
        let mut line = String::new();
        timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("read timed out")
            .expect("read failed");
        ChannelMessage::from_frame(&line).expect("undecodable frame")
    }

    async fn write_message(&mut self, msg: &ChannelMessage) {
        let frame = msg.to_frame().expect("encode failed");
        self.writer.write_all(frame.as_bytes()).await.expect("write failed");
        self.writer.write_all(b"\n").await.expect("write failed");
        self.writer.flush().await.expect("flush failed");
    }
}

async fn expect_open(events: &mut UnboundedReceiver<ChannelEvent>) -> u64 {
    match timeout(WAIT, events.recv()).await.expect("no event") {
        Some(ChannelEvent::Open { generation }) => generation,
        other => panic!("expected open event, got {other:?}"),
    }
}

fn msg(kind: &str) -> ChannelMessage {
    ChannelMessage::new(kind, serde_json::json!({ "k": kind }))
}

#[tokio::test]
async fn test_queued_sends_flush_in_order_across_reconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (handle, mut events) = TrackingChannel::spawn(TcpTransport::new(addr), fast_config());

    let mut server = ServerSide::accept(&listener).await;
    assert_eq!(expect_open(&mut events).await, 1);
    assert!(handle.is_connected());

    handle.send(msg("m1"));
    assert_eq!(server.read_message().await.kind, "m1");

    // Kill the connection; sends issued meanwhile must queue.
    drop(server);
    match timeout(WAIT, events.recv()).await.expect("no event") {
        Some(ChannelEvent::ConnectionLost) => {}
        other => panic!("expected connection lost, got {other:?}"),
    }
    handle.send(msg("m2"));
    handle.send(msg("m3"));

    let mut server = ServerSide::accept(&listener).await;
    assert_eq!(expect_open(&mut events).await, 2);
    assert_eq!(handle.generation(), 2);

    // Queued messages arrive first, in original send order.
    assert_eq!(server.read_message().await.kind, "m2");
    assert_eq!(server.read_message().await.kind, "m3");

    handle.send(msg("m4"));
    assert_eq!(server.read_message().await.kind, "m4");
}

#[tokio::test]
async fn test_connection_lost_fires_once_per_episode() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    // Nothing listening: every attempt fails, but only one loss event
    // may surface for the whole episode.
    let (_handle, mut events) =
        TrackingChannel::spawn(TcpTransport::new(addr.to_string()), fast_config());

    match timeout(WAIT, events.recv()).await.expect("no event") {
        Some(ChannelEvent::ConnectionLost) => {}
        other => panic!("expected connection lost, got {other:?}"),
    }
    // Several more backoff cycles pass in silence.
    assert!(
        timeout(Duration::from_millis(500), events.recv()).await.is_err(),
        "second loss event surfaced during the same episode"
    );
}

#[tokio::test]
async fn test_heartbeat_ping_answered_and_not_surfaced() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (_handle, mut events) = TrackingChannel::spawn(TcpTransport::new(addr), fast_config());
    let mut server = ServerSide::accept(&listener).await;
    expect_open(&mut events).await;

    server.write_message(&ChannelMessage::heartbeat_ping()).await;
    assert!(server.read_message().await.is_heartbeat_pong());

    // An application message right after proves ordering and that the
    // ping itself never reached the event stream.
    server.write_message(&msg("after-ping")).await;
    match timeout(WAIT, events.recv()).await.expect("no event") {
        Some(ChannelEvent::Message(m)) => assert_eq!(m.kind, "after-ping"),
        other => panic!("expected application message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_inbound_frame_is_dropped() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (_handle, mut events) = TrackingChannel::spawn(TcpTransport::new(addr), fast_config());
    let mut server = ServerSide::accept(&listener).await;
    expect_open(&mut events).await;

    server.writer.write_all(b"this is not json\n").await.unwrap();
    server.writer.flush().await.unwrap();
    server.write_message(&msg("valid")).await;

    // Only the valid message surfaces.
    match timeout(WAIT, events.recv()).await.expect("no event") {
        Some(ChannelEvent::Message(m)) => assert_eq!(m.kind, "valid"),
        other => panic!("expected application message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_close_is_final() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (handle, mut events) = TrackingChannel::spawn(TcpTransport::new(addr), fast_config());
    let mut server = ServerSide::accept(&listener).await;
    expect_open(&mut events).await;

    handle.close();

    // A late write from the peer must not resurrect anything. The socket
    // may already be torn down, so the write is best-effort.
    if let Ok(frame) = msg("too-late").to_frame() {
        let _ = server.writer.write_all(frame.as_bytes()).await;
        let _ = server.writer.write_all(b"\n").await;
    }

    // The actor exits, dropping its event sender: the stream ends
    // without surfacing a loss or the late message.
    match timeout(WAIT, events.recv()).await.expect("event stream stuck") {
        None => {}
        Some(other) => panic!("expected silence after close, got {other:?}"),
    }
    assert!(!handle.is_connected());
}

#[tokio::test]
async fn test_sends_before_first_connect_are_queued() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();

    let (handle, mut events) = TrackingChannel::spawn(TcpTransport::new(addr), fast_config());
    // Race-free: sends land before we ever accept.
    handle.send(msg("early-1"));
    handle.send(msg("early-2"));

    let mut server = ServerSide::accept(&listener).await;
    expect_open(&mut events).await;

    assert_eq!(server.read_message().await.kind, "early-1");
    assert_eq!(server.read_message().await.kind, "early-2");
}
