//! System-wide default constants.
//!
//! Centralises the tuning numbers so they live in one place instead of
//! scattered across the subsystems. Grouped by subsystem. Status
//! inference thresholds are product policy, not tuning, and live in
//! `status::thresholds`.

// ============================================================================
// Transport Channel
// ============================================================================

/// Fixed delay between channel reconnect attempts (milliseconds).
///
/// Retries continue indefinitely at this cadence.
pub const RECONNECT_BACKOFF_MS: u64 = 3_000;

/// Timeout for a single transport connect attempt (seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Tracking Hub
// ============================================================================

/// Interval between heartbeat pings to connected peers (seconds).
pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// A connection silent for longer than this is considered dead and
/// pruned (seconds). Three missed heartbeats.
pub const STALE_CONNECTION_SECS: u64 = 90;

// ============================================================================
// Driver Report Policy
// ============================================================================

/// Minimum movement between transmitted position updates (meters).
pub const MIN_MOVEMENT_METERS: f64 = 30.0;

/// Regular transmission cadence while tracking (milliseconds). A fix is
/// held back only when neither this interval nor a movement trigger has
/// elapsed.
pub const REPORT_INTERVAL_MS: i64 = 5_000;

/// Maximum silence between transmissions before a send is forced
/// (milliseconds). Keeps observers alive through GPS dead zones.
pub const MAX_SILENT_MS: i64 = 60_000;
