//! Geospatial kernel — pure great-circle math over WGS84 coordinates
//!
//! Stateless, allocation-free functions used by the status inference
//! engine and the driver report policy. All functions are total for
//! finite, in-range inputs; out-of-range or non-finite coordinates are a
//! caller precondition, not a runtime check.

use crate::types::Coordinate;

/// Mean Earth radius in meters (IUGG value, same as the haversine
/// convention used across the platform).
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default circular geofence radius used for arrival detection.
///
/// The kernel only exposes the primitive; arrival semantics live in the
/// status engine and report policy.
pub const GEOFENCE_RADIUS_METERS: f64 = 60.0;

/// Great-circle distance between two coordinates in meters.
///
/// Symmetric, and zero iff both points are identical. Accurate to well
/// under 0.5% for the sub-100 km distances this system works with.
pub fn haversine_distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = to_rad(b.lat - a.lat);
    let d_lng = to_rad(b.lng - a.lng);

    let h = (d_lat / 2.0).sin().powi(2)
        + to_rad(a.lat).cos() * to_rad(b.lat).cos() * (d_lng / 2.0).sin().powi(2);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Whether `point` lies within `radius_meters` of `center` (inclusive).
pub fn is_within_radius(point: Coordinate, center: Coordinate, radius_meters: f64) -> bool {
    haversine_distance_meters(point, center) <= radius_meters
}

/// Average speed in km/h between two fixes taken `elapsed_ms` apart.
///
/// Returns 0 for non-positive elapsed time. Duplicate timestamps and
/// device clock skew both show up as `elapsed_ms <= 0` in the field, so
/// this guard is load-bearing, not defensive.
pub fn speed_kmh(a: Coordinate, b: Coordinate, elapsed_ms: i64) -> f64 {
    if elapsed_ms <= 0 {
        return 0.0;
    }

    let distance_km = haversine_distance_meters(a, b) / 1000.0;
    let elapsed_hours = elapsed_ms as f64 / 3_600_000.0;
    distance_km / elapsed_hours
}

/// Initial compass bearing from `a` to `b`, in degrees `[0, 360)`.
pub fn bearing_degrees(a: Coordinate, b: Coordinate) -> f64 {
    let d_lng = to_rad(b.lng - a.lng);
    let lat1 = to_rad(a.lat);
    let lat2 = to_rad(b.lat);

    let y = d_lng.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * d_lng.cos();

    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

fn to_rad(deg: f64) -> f64 {
    deg * (std::f64::consts::PI / 180.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Santo Domingo, the platform's home market.
    const SANTO_DOMINGO: Coordinate = Coordinate::new(18.4861, -69.9312);

    #[test]
    fn test_distance_is_symmetric() {
        let a = SANTO_DOMINGO;
        let b = Coordinate::new(18.5001, -69.8505);
        let ab = haversine_distance_meters(a, b);
        let ba = haversine_distance_meters(b, a);
        assert_eq!(ab, ba);
        assert!(ab > 0.0);
    }

    #[test]
    fn test_distance_to_self_is_zero() {
        assert_eq!(haversine_distance_meters(SANTO_DOMINGO, SANTO_DOMINGO), 0.0);
    }

    #[test]
    fn test_known_distance_one_hundredth_degree_latitude() {
        // 0.01° of latitude is ~1113 m anywhere on the sphere.
        let a = SANTO_DOMINGO;
        let b = Coordinate::new(a.lat + 0.01, a.lng);
        let d = haversine_distance_meters(a, b);
        let expected = 1113.0;
        assert!(
            (d - expected).abs() / expected < 0.01,
            "expected ~{} m, got {} m",
            expected,
            d
        );
    }

    #[test]
    fn test_within_radius_boundary_is_inclusive() {
        let a = SANTO_DOMINGO;
        let b = Coordinate::new(a.lat + 0.0004, a.lng); // ~44.5 m north
        let d = haversine_distance_meters(a, b);
        assert!(is_within_radius(b, a, d));
        assert!(is_within_radius(b, a, GEOFENCE_RADIUS_METERS));
        assert!(!is_within_radius(b, a, d - 1.0));
    }

    #[test]
    fn test_speed_guards_non_positive_elapsed() {
        let a = SANTO_DOMINGO;
        let b = Coordinate::new(18.5001, -69.8505);
        assert_eq!(speed_kmh(a, b, 0), 0.0);
        assert_eq!(speed_kmh(a, b, -5), 0.0);
    }

    #[test]
    fn test_speed_known_value() {
        // ~1113 m in 60 s is ~66.8 km/h.
        let a = SANTO_DOMINGO;
        let b = Coordinate::new(a.lat + 0.01, a.lng);
        let v = speed_kmh(a, b, 60_000);
        assert!((v - 66.8).abs() < 1.0, "got {} km/h", v);
    }

    #[test]
    fn test_bearing_cardinal_directions() {
        let a = SANTO_DOMINGO;
        let north = Coordinate::new(a.lat + 0.01, a.lng);
        let east = Coordinate::new(a.lat, a.lng + 0.01);
        let south = Coordinate::new(a.lat - 0.01, a.lng);
        let west = Coordinate::new(a.lat, a.lng - 0.01);

        assert!((bearing_degrees(a, north) - 0.0).abs() < 0.1);
        assert!((bearing_degrees(a, east) - 90.0).abs() < 0.1);
        assert!((bearing_degrees(a, south) - 180.0).abs() < 0.1);
        assert!((bearing_degrees(a, west) - 270.0).abs() < 0.1);
    }

    #[test]
    fn test_bearing_stays_in_range() {
        let a = SANTO_DOMINGO;
        for i in 0..36 {
            let angle = f64::from(i) * 10.0_f64.to_radians();
            let b = Coordinate::new(a.lat + 0.01 * angle.cos(), a.lng + 0.01 * angle.sin());
            let bearing = bearing_degrees(a, b);
            assert!((0.0..360.0).contains(&bearing), "bearing {} out of range", bearing);
        }
    }
}
