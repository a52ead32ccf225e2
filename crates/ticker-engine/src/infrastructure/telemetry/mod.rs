//! Tracing Subscriber Setup
//!
//! Configures structured logging for processes embedding the engine.
//! The engine itself only emits `tracing` events; installing a subscriber
//! is the host's choice, and this module is the batteries-included way to
//! do it.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Log level filter (default: `ticker_engine=info`)
//!
//! # Usage
//!
//! ```ignore
//! use ticker_engine::infrastructure::telemetry;
//!
//! // Initialize once at startup.
//! telemetry::init();
//! ```

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default filter directive applied on top of `RUST_LOG`.
const DEFAULT_DIRECTIVE: &str = "ticker_engine=info";

/// Initialize the global tracing subscriber.
///
/// # Panics
///
/// Panics if a global subscriber has already been installed; use
/// [`try_init`] where that is not acceptable.
#[allow(clippy::expect_used)]
pub fn init() {
    try_init().expect("global tracing subscriber already installed");
}

/// Initialize the global tracing subscriber, returning an error instead of
/// panicking if one is already installed.
///
/// # Errors
///
/// Returns the underlying `tracing` init error when a subscriber exists.
#[allow(clippy::expect_used)]
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    let env_filter = EnvFilter::from_default_env().add_directive(
        DEFAULT_DIRECTIVE
            .parse()
            .expect("static directive 'ticker_engine=info' is valid"),
    );

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic_via_try_init() {
        // First call may or may not win the global slot depending on test
        // order; the second call must report the conflict as an Err.
        let _ = try_init();
        assert!(try_init().is_err());
    }
}
