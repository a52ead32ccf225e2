//! Configuration Module
//!
//! Configuration loading for the ticker engine.

mod settings;

pub use settings::{ConfigError, EngineSettings};
