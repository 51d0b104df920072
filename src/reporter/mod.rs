//! Driver report policy — decides which GPS fixes are worth transmitting
//!
//! GPS hardware fires far more often than observers need, and every
//! transmitted fix costs mobile data. The policy sends on meaningful
//! movement, holds still fixes back, and suppresses noise entirely while
//! the driver is parked inside the service geofence. A forced send on
//! the loading-to-departure transition and a maximum-silence cap keep
//! observers from ever staring at a stale marker.
//!
//! Pure state machine over `(fix, stage)` inputs; the caller owns the
//! clock and the channel.

use crate::config::ReporterSettings;
use crate::geo::{self, GEOFENCE_RADIUS_METERS};
use crate::types::{Coordinate, PositionSample, ServiceStage};

/// Why a fix was transmitted. Carried for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendReason {
    /// First fix after construction.
    Initial,
    /// Moved at least the minimum movement threshold since the last send.
    Movement,
    /// Left the service geofence while on site.
    LeftGeofence,
    /// Stage went from loading to in-progress: the trip is starting.
    DepartureTransition,
    /// Maximum silence exceeded.
    MaxSilence,
    /// Regular cadence interval elapsed.
    Interval,
}

/// Outcome of assessing one fix.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportDecision {
    /// Transmit this sample (speed already resolved).
    Send {
        sample: PositionSample,
        reason: SendReason,
    },
    /// Hold the fix back.
    Hold,
}

/// Stateful filter for one driver's fix stream.
///
/// Not thread-safe by design: one reporter per driver task.
#[derive(Debug)]
pub struct LocationReporter {
    settings: ReporterSettings,
    /// Last fix observed, sent or not. Basis for the speed fallback.
    last_fix: Option<PositionSample>,
    /// Position and time of the last transmitted fix.
    last_sent: Option<(Coordinate, i64)>,
    previous_stage: Option<ServiceStage>,
}

impl LocationReporter {
    pub fn new(settings: ReporterSettings) -> Self {
        Self {
            settings,
            last_fix: None,
            last_sent: None,
            previous_stage: None,
        }
    }

    /// Assess one GPS fix.
    ///
    /// `device_speed_kmh` is the hardware-reported speed when available;
    /// when absent it is derived from the previous fix. `origin` is the
    /// service origin, used for geofence suppression while on site.
    pub fn assess(
        &mut self,
        coordinate: Coordinate,
        timestamp_ms: i64,
        device_speed_kmh: Option<f64>,
        stage: ServiceStage,
        origin: Option<Coordinate>,
    ) -> ReportDecision {
        let speed = device_speed_kmh.unwrap_or_else(|| self.fallback_speed(coordinate, timestamp_ms));
        let departing = self.previous_stage == Some(ServiceStage::Loading)
            && stage == ServiceStage::InProgress;
        self.previous_stage = Some(stage);

        let sample = PositionSample::new(coordinate, timestamp_ms).with_speed(speed);
        self.last_fix = Some(sample);

        let Some((sent_pos, sent_at)) = self.last_sent else {
            return self.send(sample, SendReason::Initial);
        };
        let elapsed_ms = timestamp_ms - sent_at;

        if departing {
            return self.send(sample, SendReason::DepartureTransition);
        }
        if elapsed_ms > self.settings.max_silent_ms {
            return self.send(sample, SendReason::MaxSilence);
        }

        // While on site the geofence is the only movement trigger: fixes
        // jittering around the parked truck are pure noise.
        if matches!(stage, ServiceStage::DriverOnSite | ServiceStage::Loading) {
            if let Some(origin) = origin {
                if !geo::is_within_radius(coordinate, origin, GEOFENCE_RADIUS_METERS) {
                    return self.send(sample, SendReason::LeftGeofence);
                }
            }
            return ReportDecision::Hold;
        }

        let moved_m = geo::haversine_distance_meters(sent_pos, coordinate);
        if moved_m >= self.settings.min_movement_meters {
            return self.send(sample, SendReason::Movement);
        }
        if elapsed_ms >= self.settings.report_interval_ms {
            return self.send(sample, SendReason::Interval);
        }
        ReportDecision::Hold
    }

    fn send(&mut self, sample: PositionSample, reason: SendReason) -> ReportDecision {
        self.last_sent = Some((sample.coordinate, sample.timestamp_ms));
        ReportDecision::Send { sample, reason }
    }

    fn fallback_speed(&self, coordinate: Coordinate, timestamp_ms: i64) -> f64 {
        match &self.last_fix {
            Some(prev) => geo::speed_kmh(
                prev.coordinate,
                coordinate,
                timestamp_ms - prev.timestamp_ms,
            ),
            None => 0.0,
        }
    }
}
