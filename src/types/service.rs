//! Service lifecycle types: ServiceStage, StatusCode, DerivedStatus

use super::geo::Coordinate;
use serde::{Deserialize, Serialize};

/// Fixed origin/destination pair for a service.
///
/// Set once at service creation by the dispatch layer; never mutated by
/// the tracking core.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ServiceWaypoints {
    pub origin: Coordinate,
    pub destination: Coordinate,
}

impl ServiceWaypoints {
    pub const fn new(origin: Coordinate, destination: Coordinate) -> Self {
        Self {
            origin,
            destination,
        }
    }
}

/// Coarse lifecycle stage of a service, owned by the external dispatch
/// layer. The tracking core reads it as an input per invocation and
/// never transitions it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ServiceStage {
    /// Created, no driver assigned yet.
    #[default]
    Pending,
    /// Driver accepted, heading to the origin.
    Accepted,
    /// Driver arrived at the origin.
    DriverOnSite,
    /// Vehicle being loaded at the origin.
    Loading,
    /// Under way toward the destination.
    InProgress,
    Completed,
    Cancelled,
}

impl ServiceStage {
    /// Short code for structured log fields.
    pub const fn short_code(self) -> &'static str {
        match self {
            Self::Pending => "PEND",
            Self::Accepted => "ACPT",
            Self::DriverOnSite => "SITE",
            Self::Loading => "LOAD",
            Self::InProgress => "PROG",
            Self::Completed => "DONE",
            Self::Cancelled => "CANC",
        }
    }
}

impl std::fmt::Display for ServiceStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::DriverOnSite => write!(f, "driver_on_site"),
            Self::Loading => write!(f, "loading"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Fine-grained status derived from position, speed and stage.
///
/// Distinct from [`ServiceStage`]: the stage is authoritative and
/// externally owned, the status code is a recomputed-per-sample
/// projection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusCode {
    EnRoute,
    Arriving,
    Working,
    EnRouteToDestination,
    ArrivingAtDestination,
    InService,
}

impl std::fmt::Display for StatusCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EnRoute => write!(f, "en_route"),
            Self::Arriving => write!(f, "arriving"),
            Self::Working => write!(f, "working"),
            Self::EnRouteToDestination => write!(f, "en_route_to_destination"),
            Self::ArrivingAtDestination => write!(f, "arriving_at_destination"),
            Self::InService => write!(f, "in_service"),
        }
    }
}

/// Result of one status inference pass.
///
/// A pure, stateless projection of (position, waypoints, stage, speed) —
/// it carries no identity and is not persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DerivedStatus {
    pub status: StatusCode,
    /// User-facing copy for the tracking screen.
    pub message: String,
    /// Distance to the current target waypoint (origin or destination
    /// depending on stage).
    pub distance_to_target_m: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&ServiceStage::DriverOnSite).unwrap(),
            "\"driver_on_site\""
        );
        let stage: ServiceStage = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(stage, ServiceStage::InProgress);
    }

    #[test]
    fn test_status_code_serde_snake_case() {
        assert_eq!(
            serde_json::to_string(&StatusCode::ArrivingAtDestination).unwrap(),
            "\"arriving_at_destination\""
        );
    }

    #[test]
    fn test_stage_display_matches_serde() {
        for stage in [
            ServiceStage::Pending,
            ServiceStage::Accepted,
            ServiceStage::DriverOnSite,
            ServiceStage::Loading,
            ServiceStage::InProgress,
            ServiceStage::Completed,
            ServiceStage::Cancelled,
        ] {
            let serde_repr = serde_json::to_string(&stage).unwrap();
            assert_eq!(serde_repr, format!("\"{}\"", stage));
        }
    }
}
