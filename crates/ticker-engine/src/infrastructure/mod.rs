//! Infrastructure Layer - Adapters and cross-cutting integrations.
//!
//! This layer contains the concrete implementations of cross-cutting
//! concerns the application services rely on. Exchange client adapters are
//! supplied by the embedding process against the application-layer ports.

/// Broadcast channel fan-out for ticker events.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing subscriber setup.
pub mod telemetry;
