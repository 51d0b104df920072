//! API route handlers
//!
//! Dispatch glue and diagnostics: service registration and stage
//! transitions come in here, live tracking state goes out. The hub core
//! never calls these; the dispatch layer and operators do.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::info;

use crate::hub::{DirectoryError, ServiceDirectory, SessionRegistry};
use crate::status::{derive_status, stage_label};
use crate::types::{Coordinate, DerivedStatus, PositionSample, ServiceStage, ServiceWaypoints};

// ============================================================================
// API State
// ============================================================================

/// Shared state for API handlers.
#[derive(Clone)]
pub struct HubApiState {
    pub registry: SessionRegistry,
    pub directory: ServiceDirectory,
    pub started_at: Instant,
}

impl HubApiState {
    pub fn new(registry: SessionRegistry, directory: ServiceDirectory) -> Self {
        Self {
            registry,
            directory,
            started_at: Instant::now(),
        }
    }
}

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub connections: usize,
    pub services: usize,
}

#[derive(Debug, Deserialize)]
pub struct CreateServiceRequest {
    pub service_id: String,
    pub origin: Coordinate,
    pub destination: Coordinate,
}

#[derive(Debug, Deserialize)]
pub struct SetStageRequest {
    pub stage: ServiceStage,
}

#[derive(Debug, Serialize)]
pub struct StageResponse {
    pub service_id: String,
    pub previous_stage: ServiceStage,
    pub stage: ServiceStage,
}

#[derive(Debug, Serialize)]
pub struct ServiceResponse {
    pub service_id: String,
    pub stage: ServiceStage,
    pub stage_label: &'static str,
    pub waypoints: ServiceWaypoints,
    pub subscribers: usize,
    pub last_position: Option<PositionSample>,
    /// Present once at least one position has been reported.
    pub derived_status: Option<DerivedStatus>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

impl From<DirectoryError> for Response {
    fn from(e: DirectoryError) -> Self {
        match e {
            DirectoryError::UnknownService(_) => error_response(StatusCode::NOT_FOUND, e.to_string()),
            DirectoryError::AlreadyRegistered(_) => {
                error_response(StatusCode::CONFLICT, e.to_string())
            }
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}

pub async fn get_status(State(state): State<HubApiState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        connections: state.registry.connection_count().await,
        services: state.directory.len().await,
    })
}

pub async fn create_service(
    State(state): State<HubApiState>,
    Json(req): Json<CreateServiceRequest>,
) -> Response {
    let waypoints = ServiceWaypoints::new(req.origin, req.destination);
    match state.directory.register(&req.service_id, waypoints).await {
        Ok(()) => {
            info!(service = %req.service_id, origin = %req.origin, destination = %req.destination, "Service registered");
            StatusCode::CREATED.into_response()
        }
        Err(e) => e.into(),
    }
}

pub async fn set_stage(
    State(state): State<HubApiState>,
    Path(service_id): Path<String>,
    Json(req): Json<SetStageRequest>,
) -> Response {
    match state.directory.set_stage(&service_id, req.stage).await {
        Ok(previous) => {
            info!(service = %service_id, from = %previous, to = %req.stage, "Stage transition");
            Json(StageResponse {
                service_id,
                previous_stage: previous,
                stage: req.stage,
            })
            .into_response()
        }
        Err(e) => e.into(),
    }
}

pub async fn get_service(
    State(state): State<HubApiState>,
    Path(service_id): Path<String>,
) -> Response {
    let Some(record) = state.directory.snapshot(&service_id).await else {
        return DirectoryError::UnknownService(service_id).into();
    };

    let last_position = state.registry.last_position(&service_id).await;
    let derived_status = last_position.map(|sample| {
        derive_status(
            sample.coordinate,
            &record.waypoints,
            record.stage,
            sample.speed_kmh,
        )
    });

    Json(ServiceResponse {
        subscribers: state.registry.subscriber_count(&service_id).await,
        service_id,
        stage: record.stage,
        stage_label: stage_label(record.stage),
        waypoints: record.waypoints,
        last_position,
        derived_status,
    })
    .into_response()
}
