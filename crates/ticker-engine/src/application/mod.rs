//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the engine's services and the port interfaces
//! through which it reaches exchange clients.

/// Port interfaces for exchange access.
pub mod ports;

/// Subscription reconciliation, polling, and lifecycle services.
pub mod services;
