//! Channel TCP listener — the server-side peer of the tracking channel
//!
//! Accepts line-framed JSON connections from drivers and observers.
//! Each connection gets a reader loop plus a writer task draining its
//! outbound queue; the registry and directory are shared handles.

use super::directory::ServiceDirectory;
use super::protocol::{Inbound, PositionUpdate, StatusUpdate, UpdateLocation};
use super::registry::{ConnId, SessionRegistry};
use crate::channel::ChannelMessage;
use crate::config::HubSettings;
use crate::status::derive_status;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Run the channel listener until cancelled. The listener is bound by
/// the caller so tests and the supervisor can pick the port.
pub async fn run_channel_server(
    listener: TcpListener,
    registry: SessionRegistry,
    directory: ServiceDirectory,
    settings: HubSettings,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    info!(addr = %listener.local_addr()?, "Channel listener started");

    let heartbeat = tokio::spawn(run_heartbeat(
        registry.clone(),
        settings,
        cancel.child_token(),
    ));

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                info!("Channel listener shutting down");
                break;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "Connection accepted");
                        let registry = registry.clone();
                        let directory = directory.clone();
                        let cancel = cancel.child_token();
                        tokio::spawn(async move {
                            handle_connection(stream, registry, directory, cancel).await;
                        });
                    }
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                    }
                }
            }
        }
    }

    heartbeat.abort();
    Ok(())
}

/// Ping every connection on a fixed cadence and prune the silent ones.
async fn run_heartbeat(registry: SessionRegistry, settings: HubSettings, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(settings.heartbeat_interval());
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            () = cancel.cancelled() => return,
            _ = interval.tick() => {
                registry.broadcast_all(&ChannelMessage::heartbeat_ping()).await;
                let pruned = registry.prune_stale(settings.stale_after()).await;
                for id in pruned {
                    warn!(conn = %id, "Pruned stale connection");
                }
            }
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    registry: SessionRegistry,
    directory: ServiceDirectory,
    cancel: CancellationToken,
) {
    // TCP keepalive so half-dead links are detected between frames,
    // matching the client-side transport.
    let sock_ref = socket2::SockRef::from(&stream);
    let keepalive = socket2::TcpKeepalive::new()
        .with_time(Duration::from_secs(30))
        .with_interval(Duration::from_secs(10));
    let _ = sock_ref.set_tcp_keepalive(&keepalive);

    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
    // The registry cancels this token when it prunes the connection,
    // which unparks the reader and closes the socket.
    let conn_id = registry
        .add_connection(outbound_tx.clone(), cancel.clone())
        .await;

    let mut writer = tokio::spawn(run_writer(write_half, outbound_rx));

    // The writer finishes when the peer stops accepting writes; the
    // reader must not keep the socket open past that.
    tokio::select! {
        () = read_loop(
            read_half,
            conn_id,
            &registry,
            &directory,
            &outbound_tx,
            &cancel,
        ) => {}
        _ = &mut writer => {
            debug!(conn = %conn_id, "Writer finished, closing connection");
        }
    }

    registry.remove_connection(conn_id).await;
    writer.abort();
    debug!(conn = %conn_id, "Connection handler finished");
}

async fn run_writer(
    mut write_half: OwnedWriteHalf,
    mut outbound_rx: mpsc::UnboundedReceiver<ChannelMessage>,
) {
    while let Some(msg) = outbound_rx.recv().await {
        let Ok(frame) = msg.to_frame() else { continue };
        if write_half.write_all(frame.as_bytes()).await.is_err()
            || write_half.write_all(b"\n").await.is_err()
            || write_half.flush().await.is_err()
        {
            return;
        }
    }
}

async fn read_loop(
    read_half: OwnedReadHalf,
    conn_id: ConnId,
    registry: &SessionRegistry,
    directory: &ServiceDirectory,
    outbound: &mpsc::UnboundedSender<ChannelMessage>,
    cancel: &CancellationToken,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::with_capacity(256);

    loop {
        line.clear();
        let read = tokio::select! {
            () = cancel.cancelled() => return,
            read = reader.read_line(&mut line) => read,
        };
        match read {
            Ok(0) => {
                debug!(conn = %conn_id, "Peer closed connection");
                return;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match ChannelMessage::from_frame(trimmed) {
                    Ok(msg) => {
                        handle_message(conn_id, &msg, registry, directory, outbound).await;
                    }
                    Err(e) => {
                        warn!(conn = %conn_id, error = %e, "Dropping undecodable frame");
                    }
                }
            }
            Err(e) => {
                debug!(conn = %conn_id, error = %e, "Read error, dropping connection");
                return;
            }
        }
    }
}

async fn handle_message(
    conn_id: ConnId,
    msg: &ChannelMessage,
    registry: &SessionRegistry,
    directory: &ServiceDirectory,
    outbound: &mpsc::UnboundedSender<ChannelMessage>,
) {
    // Any inbound frame proves the connection is alive.
    registry.touch(conn_id).await;

    if msg.is_heartbeat_pong() {
        return;
    }
    if msg.is_heartbeat_ping() {
        let _ = outbound.send(ChannelMessage::heartbeat_pong());
        return;
    }

    match Inbound::decode(msg) {
        Ok(Inbound::Subscribe(op)) => {
            registry.subscribe(conn_id, &op.service_id).await;
            debug!(conn = %conn_id, service = %op.service_id, "Subscriber added");

            // Late joiners get the last known position right away.
            if let Some(position) = registry.last_position(&op.service_id).await {
                let update = PositionUpdate {
                    service_id: op.service_id,
                    position,
                };
                let _ = outbound.send(update.into_message());
            }
        }
        Ok(Inbound::RegisterDriver(op)) => {
            registry.register_driver(conn_id, &op.driver_id).await;
            info!(conn = %conn_id, driver = %op.driver_id, "Driver registered");
        }
        Ok(Inbound::UpdateLocation(op)) => {
            handle_location_update(op, registry, directory).await;
        }
        Err(e) => {
            warn!(conn = %conn_id, error = %e, "Rejected inbound message");
        }
    }
}

/// Store the sample, derive the tracking status against the service
/// snapshot and fan both updates out to the service's subscribers.
async fn handle_location_update(
    op: UpdateLocation,
    registry: &SessionRegistry,
    directory: &ServiceDirectory,
) {
    let Some(record) = directory.snapshot(&op.service_id).await else {
        warn!(service = %op.service_id, driver = %op.driver_id, "Position for unknown service dropped");
        return;
    };

    registry.record_position(&op.service_id, op.position).await;

    let status = derive_status(
        op.position.coordinate,
        &record.waypoints,
        record.stage,
        op.position.speed_kmh,
    );

    let position_msg = PositionUpdate {
        service_id: op.service_id.clone(),
        position: op.position,
    }
    .into_message();
    let status_msg = StatusUpdate {
        service_id: op.service_id.clone(),
        stage: record.stage,
        status,
    }
    .into_message();

    let reached = registry
        .broadcast(&op.service_id, &[position_msg, status_msg])
        .await;
    debug!(
        service = %op.service_id,
        driver = %op.driver_id,
        subscribers = reached,
        "Position update broadcast"
    );
}
