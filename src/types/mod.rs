//! Shared data structures for the tracking core
//!
//! This module defines the types that cross component boundaries:
//! coordinates and position samples (device → engine), service waypoints
//! and lifecycle stage (dispatch layer → engine), and the derived status
//! the engine produces per sample.

mod geo;
mod service;

pub use geo::{Coordinate, PositionSample};
pub use service::{DerivedStatus, ServiceStage, ServiceWaypoints, StatusCode};
