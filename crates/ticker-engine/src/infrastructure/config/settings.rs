//! Engine Configuration Settings
//!
//! Configuration types for the ticker engine, loaded from environment
//! variables by the embedding process.

use std::time::Duration;

/// Complete engine configuration.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Sleep between polling passes.
    pub poll_interval: Duration,
    /// Capacity of the ticker event broadcast channel.
    pub event_capacity: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            event_capacity: 10_000,
        }
    }
}

impl EngineSettings {
    /// Create configuration from environment variables.
    ///
    /// - `TICKER_ENGINE_POLL_INTERVAL_MS`: polling cadence (default: 5000)
    /// - `TICKER_ENGINE_EVENT_CAPACITY`: broadcast capacity (default: 10000)
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but unparseable, or if the
    /// configured polling interval is zero.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let poll_interval = parse_env_duration_millis(
            "TICKER_ENGINE_POLL_INTERVAL_MS",
            defaults.poll_interval,
        )?;
        let event_capacity =
            parse_env_usize("TICKER_ENGINE_EVENT_CAPACITY", defaults.event_capacity)?;

        let settings = Self {
            poll_interval,
            event_capacity,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Check invariants on the configured values.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero polling interval or zero event capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "TICKER_ENGINE_POLL_INTERVAL_MS".to_string(),
                reason: "polling interval must be non-zero".to_string(),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "TICKER_ENGINE_EVENT_CAPACITY".to_string(),
                reason: "event capacity must be non-zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable is set but cannot be parsed.
    #[error("environment variable {key} is not a valid number: {value}")]
    UnparseableValue {
        /// The offending variable name.
        key: String,
        /// The raw value found.
        value: String,
    },
    /// Environment variable parsed but violates an invariant.
    #[error("environment variable {key} is invalid: {reason}")]
    InvalidValue {
        /// The offending variable name.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
}

fn parse_env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::UnparseableValue {
            key: key.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_duration_millis(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|_| ConfigError::UnparseableValue {
                key: key.to_string(),
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}
