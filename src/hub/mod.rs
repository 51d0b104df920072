//! Tracking hub — the server side of the realtime channel
//!
//! Drivers push position reports in; observers subscribe per service and
//! receive position and derived-status broadcasts. Service waypoints and
//! lifecycle stages are owned by the dispatch layer and arrive through
//! the REST API.

mod directory;
pub mod protocol;
mod registry;
mod server;

pub use directory::{DirectoryError, ServiceDirectory, ServiceRecord};
pub use registry::{ConnId, SessionRegistry};
pub use server::run_channel_server;
