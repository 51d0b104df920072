//! Servitrack: realtime geolocation tracking for mobile service dispatch
//!
//! Core of a tow-truck style dispatch platform: drivers stream GPS fixes
//! over a self-healing channel, the hub derives a fine-grained tracking
//! status per service and fans live updates out to subscribed observers.
//!
//! ## Architecture
//!
//! - **Geospatial Kernel**: pure haversine/bearing/speed math
//! - **Status Inference Engine**: position + stage → tracking status
//! - **Transport Channel**: reconnecting line-framed JSON stream
//! - **Tracking Hub**: session registry, service directory, broadcasts
//! - **Report Policy**: which GPS fixes are worth transmitting

pub mod api;
pub mod channel;
pub mod config;
pub mod geo;
pub mod hub;
pub mod reporter;
pub mod status;
pub mod types;

// Re-export the configuration root
pub use config::TrackerConfig;

// Re-export commonly used types
pub use types::{
    Coordinate, DerivedStatus, PositionSample, ServiceStage, ServiceWaypoints, StatusCode,
};

// Re-export channel components
pub use channel::{ChannelConfig, ChannelEvent, ChannelHandle, ChannelMessage, TrackingChannel};

// Re-export hub components
pub use hub::{ServiceDirectory, SessionRegistry};

// Re-export the inference entry points
pub use status::{derive_status, stage_label};
