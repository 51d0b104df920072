//! Session registry — who is connected, and who watches which service
//!
//! Each connection gets an outbound queue on accept; the registry maps
//! connections to services (subscribers) and drivers (one connection
//! per driver, latest wins). Broadcasts enqueue to each subscriber's
//! queue, so per-subscriber delivery order matches enqueue order.

use crate::channel::ChannelMessage;
use crate::types::PositionSample;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Opaque connection identifier, unique for the life of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnId(u64);

impl std::fmt::Display for ConnId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

struct ConnectionEntry {
    outbound: mpsc::UnboundedSender<ChannelMessage>,
    /// Cancelled when the registry evicts the connection, so its handler
    /// tears down the socket instead of waiting on a dead peer.
    cancel: CancellationToken,
    last_seen: Instant,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    connections: HashMap<ConnId, ConnectionEntry>,
    /// Service → subscriber connections.
    subscribers: HashMap<String, HashSet<ConnId>>,
    /// Driver → its current connection.
    drivers: HashMap<String, ConnId>,
    /// Last reported position per service, for late-joining observers.
    last_positions: HashMap<String, PositionSample>,
}

/// Shared connection registry. Cheap to clone.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new connection; `outbound` is its write queue and
    /// `cancel` stops its handler when the registry evicts it.
    pub async fn add_connection(
        &self,
        outbound: mpsc::UnboundedSender<ChannelMessage>,
        cancel: CancellationToken,
    ) -> ConnId {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = ConnId(inner.next_id);
        inner.connections.insert(
            id,
            ConnectionEntry {
                outbound,
                cancel,
                last_seen: Instant::now(),
            },
        );
        id
    }

    /// Drop a connection and every reference to it.
    pub async fn remove_connection(&self, id: ConnId) {
        let mut inner = self.inner.write().await;
        inner.connections.remove(&id);
        inner.subscribers.retain(|_, conns| {
            conns.remove(&id);
            !conns.is_empty()
        });
        inner.drivers.retain(|_, conn| *conn != id);
        debug!(conn = %id, "Connection removed from registry");
    }

    pub async fn subscribe(&self, id: ConnId, service_id: &str) {
        let mut inner = self.inner.write().await;
        inner
            .subscribers
            .entry(service_id.to_string())
            .or_default()
            .insert(id);
    }

    /// Bind a driver to its connection. A driver reconnecting displaces
    /// its previous binding.
    pub async fn register_driver(&self, id: ConnId, driver_id: &str) {
        let mut inner = self.inner.write().await;
        inner.drivers.insert(driver_id.to_string(), id);
    }

    /// Record activity on a connection (any inbound frame counts).
    pub async fn touch(&self, id: ConnId) {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.connections.get_mut(&id) {
            entry.last_seen = Instant::now();
        }
    }

    pub async fn record_position(&self, service_id: &str, sample: PositionSample) {
        let mut inner = self.inner.write().await;
        inner.last_positions.insert(service_id.to_string(), sample);
    }

    pub async fn last_position(&self, service_id: &str) -> Option<PositionSample> {
        self.inner.read().await.last_positions.get(service_id).copied()
    }

    /// Queue messages, in order, to every subscriber of a service.
    /// Returns the number of subscribers reached.
    pub async fn broadcast(&self, service_id: &str, messages: &[ChannelMessage]) -> usize {
        let inner = self.inner.read().await;
        let Some(conns) = inner.subscribers.get(service_id) else {
            return 0;
        };
        let mut reached = 0;
        for id in conns {
            if let Some(entry) = inner.connections.get(id) {
                let mut delivered = true;
                for msg in messages {
                    // A send failure means the connection is mid-teardown;
                    // its handler removes it.
                    if entry.outbound.send(msg.clone()).is_err() {
                        delivered = false;
                        break;
                    }
                }
                if delivered {
                    reached += 1;
                }
            }
        }
        reached
    }

    /// Queue one message to every live connection.
    pub async fn broadcast_all(&self, message: &ChannelMessage) {
        let inner = self.inner.read().await;
        for entry in inner.connections.values() {
            let _ = entry.outbound.send(message.clone());
        }
    }

    /// Remove connections silent for longer than `stale_after`, returning
    /// their ids so the caller can log them. Each evicted connection's
    /// cancel token fires, which closes its socket.
    pub async fn prune_stale(&self, stale_after: Duration) -> Vec<ConnId> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let stale: Vec<ConnId> = inner
            .connections
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.last_seen) > stale_after)
            .map(|(id, _)| *id)
            .collect();
        for id in &stale {
            if let Some(entry) = inner.connections.remove(id) {
                entry.cancel.cancel();
            }
            inner.subscribers.retain(|_, conns| {
                conns.remove(id);
                !conns.is_empty()
            });
            inner.drivers.retain(|_, conn| conn != id);
        }
        stale
    }

    pub async fn connection_count(&self) -> usize {
        self.inner.read().await.connections.len()
    }

    pub async fn subscriber_count(&self, service_id: &str) -> usize {
        self.inner
            .read()
            .await
            .subscribers
            .get(service_id)
            .map_or(0, HashSet::len)
    }
}
