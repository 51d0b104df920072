//! Hub behavior with real TCP peers: subscription fan-out, broadcast
//! ordering, heartbeats and the late-joiner snapshot.

use servitrack::channel::ChannelMessage;
use servitrack::config::HubSettings;
use servitrack::hub::{run_channel_server, ServiceDirectory, SessionRegistry};
use servitrack::types::{Coordinate, ServiceStage, ServiceWaypoints};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(5);

const ORIGIN: Coordinate = Coordinate::new(18.4861, -69.9312);
const DESTINATION: Coordinate = Coordinate::new(18.5432, -69.8571);

struct TestHub {
    addr: SocketAddr,
    directory: ServiceDirectory,
    cancel: CancellationToken,
}

impl Drop for TestHub {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn start_hub(settings: HubSettings) -> TestHub {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let registry = SessionRegistry::new();
    let directory = ServiceDirectory::new();
    let cancel = CancellationToken::new();

    tokio::spawn(run_channel_server(
        listener,
        registry,
        directory.clone(),
        settings,
        cancel.clone(),
    ));

    TestHub {
        addr,
        directory,
        cancel,
    }
}

struct Peer {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Peer {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect failed");
        let (read_half, write_half) = stream.into_split();
        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        }
    }

    async fn send(&mut self, kind: &str, payload: serde_json::Value) {
        let frame = ChannelMessage::new(kind, payload).to_frame().unwrap();
        self.writer.write_all(frame.as_bytes()).await.unwrap();
        self.writer.write_all(b"\n").await.unwrap();
        self.writer.flush().await.unwrap();
    }

    async fn recv(&mut self) -> ChannelMessage {
        let mut line = String::new();
        timeout(WAIT, self.reader.read_line(&mut line))
            .await
            .expect("read timed out")
            .expect("read failed");
        ChannelMessage::from_frame(&line).expect("undecodable frame")
    }

    /// Next message that is not a heartbeat ping from the hub.
    async fn recv_app(&mut self) -> ChannelMessage {
        loop {
            let msg = self.recv().await;
            if !msg.is_heartbeat_ping() {
                return msg;
            }
        }
    }
}

fn location_payload(lat: f64, lng: f64, speed_kmh: f64) -> serde_json::Value {
    serde_json::json!({
        "service_id": "svc-1",
        "driver_id": "drv-1",
        "coordinate": { "lat": lat, "lng": lng },
        "timestamp_ms": 1_700_000_000_000_i64,
        "speed_kmh": speed_kmh,
    })
}

async fn setup_service(hub: &TestHub, stage: ServiceStage) {
    hub.directory
        .register("svc-1", ServiceWaypoints::new(ORIGIN, DESTINATION))
        .await
        .unwrap();
    hub.directory.set_stage("svc-1", stage).await.unwrap();
}

#[tokio::test]
async fn test_update_fans_out_position_then_status() {
    let hub = start_hub(HubSettings::default()).await;
    setup_service(&hub, ServiceStage::Accepted).await;

    let mut observer = Peer::connect(hub.addr).await;
    observer
        .send("subscribe_service", serde_json::json!({"service_id": "svc-1"}))
        .await;
    // Subscription registration is async; give the hub a beat.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut driver = Peer::connect(hub.addr).await;
    driver
        .send("register_driver", serde_json::json!({"driver_id": "drv-1"}))
        .await;
    // ~50 m north of the origin, slow: an arriving driver.
    driver
        .send(
            "update_location",
            location_payload(ORIGIN.lat + 50.0 / 111_195.0, ORIGIN.lng, 2.0),
        )
        .await;

    let first = observer.recv_app().await;
    assert_eq!(first.kind, "position_update");
    assert_eq!(first.payload["service_id"], "svc-1");
    assert!((first.payload["coordinate"]["lng"].as_f64().unwrap() - ORIGIN.lng).abs() < 1e-9);

    let second = observer.recv_app().await;
    assert_eq!(second.kind, "status_update");
    assert_eq!(second.payload["stage"], "accepted");
    assert_eq!(second.payload["status"], "arriving");
    assert!(second.payload["distance_to_target_m"].as_f64().unwrap() < 60.0);
}

#[tokio::test]
async fn test_non_subscribers_receive_nothing() {
    let hub = start_hub(HubSettings::default()).await;
    setup_service(&hub, ServiceStage::Accepted).await;

    let mut bystander = Peer::connect(hub.addr).await;
    bystander
        .send("subscribe_service", serde_json::json!({"service_id": "svc-other"}))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut driver = Peer::connect(hub.addr).await;
    driver
        .send(
            "update_location",
            location_payload(ORIGIN.lat, ORIGIN.lng, 0.0),
        )
        .await;

    // Heartbeat pings are hub housekeeping, not fan-out; only an
    // application-level frame is a failure.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    let mut line = String::new();
    loop {
        line.clear();
        let Ok(read) = tokio::time::timeout_at(deadline, bystander.reader.read_line(&mut line))
            .await
        else {
            break;
        };
        read.expect("read failed");
        let msg = ChannelMessage::from_frame(line.trim()).expect("undecodable frame");
        assert!(msg.is_heartbeat_ping(), "bystander received: {line:?}");
    }
}

#[tokio::test]
async fn test_late_subscriber_gets_last_known_position() {
    let hub = start_hub(HubSettings::default()).await;
    setup_service(&hub, ServiceStage::InProgress).await;

    let mut driver = Peer::connect(hub.addr).await;
    driver
        .send(
            "update_location",
            location_payload(18.5000, -69.9000, 45.0),
        )
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut observer = Peer::connect(hub.addr).await;
    observer
        .send("subscribe_service", serde_json::json!({"service_id": "svc-1"}))
        .await;

    let snapshot = observer.recv_app().await;
    assert_eq!(snapshot.kind, "position_update");
    assert!((snapshot.payload["coordinate"]["lat"].as_f64().unwrap() - 18.5).abs() < 1e-9);
}

#[tokio::test]
async fn test_update_for_unknown_service_is_dropped() {
    let hub = start_hub(HubSettings::default()).await;
    // No service registered at all.

    let mut observer = Peer::connect(hub.addr).await;
    observer
        .send("subscribe_service", serde_json::json!({"service_id": "svc-1"}))
        .await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut driver = Peer::connect(hub.addr).await;
    driver
        .send(
            "update_location",
            location_payload(ORIGIN.lat, ORIGIN.lng, 0.0),
        )
        .await;

    // Heartbeat pings are hub housekeeping, not fan-out; only an
    // application-level frame is a failure.
    let deadline = tokio::time::Instant::now() + Duration::from_millis(500);
    let mut line = String::new();
    loop {
        line.clear();
        let Ok(read) = tokio::time::timeout_at(deadline, observer.reader.read_line(&mut line))
            .await
        else {
            break;
        };
        read.expect("read failed");
        let msg = ChannelMessage::from_frame(line.trim()).expect("undecodable frame");
        assert!(msg.is_heartbeat_ping(), "observer received: {line:?}");
    }
}

#[tokio::test]
async fn test_hub_pings_and_accepts_pong() {
    let settings = HubSettings {
        heartbeat_interval_secs: 1,
        stale_connection_secs: 30,
    };
    let hub = start_hub(settings).await;

    let mut peer = Peer::connect(hub.addr).await;
    let msg = peer.recv().await;
    assert!(msg.is_heartbeat_ping());
    peer.send("heartbeat-pong", serde_json::Value::Null).await;

    // Connection stays alive through the next ping.
    let msg = peer.recv().await;
    assert!(msg.is_heartbeat_ping());
}

#[tokio::test]
async fn test_stale_peer_is_pruned_and_socket_closed() {
    let settings = HubSettings {
        heartbeat_interval_secs: 1,
        stale_connection_secs: 2,
    };
    let hub = start_hub(settings).await;

    let mut peer = Peer::connect(hub.addr).await;
    peer.send("subscribe_service", serde_json::json!({"service_id": "svc-1"}))
        .await;

    // Never answer the pings. Pruning must actually close the socket,
    // not just forget the connection, so the peer sees EOF.
    let mut line = String::new();
    loop {
        line.clear();
        let read = timeout(WAIT, peer.reader.read_line(&mut line))
            .await
            .expect("hub never closed the pruned connection")
            .expect("read failed");
        if read == 0 {
            break;
        }
        let msg = ChannelMessage::from_frame(line.trim()).expect("undecodable frame");
        assert!(msg.is_heartbeat_ping(), "unexpected message: {msg:?}");
    }
}
