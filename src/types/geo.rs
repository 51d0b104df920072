//! Geographic value types: Coordinate, PositionSample

use serde::{Deserialize, Serialize};

/// A WGS84 position in decimal degrees.
///
/// Callers must supply finite values in valid range (lat −90..90,
/// lng −180..180); the geospatial kernel does not re-validate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6},{:.6}", self.lat, self.lng)
    }
}

/// A single GPS fix reported by a driver's device.
///
/// Devices report at irregular intervals — every few seconds when moving,
/// much less often when parked. Each sample is consumed exactly once by
/// the status inference engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionSample {
    pub coordinate: Coordinate,
    /// Unix epoch milliseconds as reported by the device clock.
    pub timestamp_ms: i64,
    /// Device-reported speed. Zero when the device omits it; the
    /// reporter derives a fallback from consecutive fixes in that case.
    #[serde(default)]
    pub speed_kmh: f64,
}

impl PositionSample {
    pub const fn new(coordinate: Coordinate, timestamp_ms: i64) -> Self {
        Self {
            coordinate,
            timestamp_ms,
            speed_kmh: 0.0,
        }
    }

    #[must_use]
    pub const fn with_speed(mut self, speed_kmh: f64) -> Self {
        self.speed_kmh = speed_kmh;
        self
    }
}
