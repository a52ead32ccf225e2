//! Application Services
//!
//! Services that orchestrate subscription state and coordinate between
//! ports and the broadcast hub.
//!
//! - `streaming`: Reconciles desired instrument sets against live sessions
//! - `polling`: Continuous fetch loop for exchanges without streaming
//! - `engine`: Lifecycle controller owning the polling task and the
//!   subscription-update entry point

mod engine;
mod polling;
mod streaming;

pub use engine::{ServiceError, ServiceState, TickerService};
pub use polling::PollingLoop;
pub use streaming::StreamingConnectionManager;
