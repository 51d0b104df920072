//! Service directory — waypoints and lifecycle stage per active service
//!
//! Stage transitions are owned by the dispatch layer and arrive through
//! the REST API; the tracking path only reads snapshots. Keeping the
//! directory separate from the session registry means a burst of
//! position traffic never contends with dispatch writes.

use crate::types::{ServiceStage, ServiceWaypoints};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("unknown service: {0}")]
    UnknownService(String),

    #[error("service already registered: {0}")]
    AlreadyRegistered(String),
}

/// Immutable-per-read snapshot of one service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceRecord {
    pub waypoints: ServiceWaypoints,
    pub stage: ServiceStage,
    pub registered_at: DateTime<Utc>,
}

/// Shared registry of active services. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct ServiceDirectory {
    inner: Arc<RwLock<HashMap<String, ServiceRecord>>>,
}

impl ServiceDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new service in `Pending` stage.
    pub async fn register(
        &self,
        service_id: &str,
        waypoints: ServiceWaypoints,
    ) -> Result<(), DirectoryError> {
        let mut map = self.inner.write().await;
        if map.contains_key(service_id) {
            return Err(DirectoryError::AlreadyRegistered(service_id.to_string()));
        }
        map.insert(
            service_id.to_string(),
            ServiceRecord {
                waypoints,
                stage: ServiceStage::default(),
                registered_at: Utc::now(),
            },
        );
        Ok(())
    }

    /// Advance a service's lifecycle stage. Returns the previous stage.
    pub async fn set_stage(
        &self,
        service_id: &str,
        stage: ServiceStage,
    ) -> Result<ServiceStage, DirectoryError> {
        let mut map = self.inner.write().await;
        let record = map
            .get_mut(service_id)
            .ok_or_else(|| DirectoryError::UnknownService(service_id.to_string()))?;
        let previous = record.stage;
        record.stage = stage;
        Ok(previous)
    }

    pub async fn snapshot(&self, service_id: &str) -> Option<ServiceRecord> {
        self.inner.read().await.get(service_id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}
