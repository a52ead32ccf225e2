//! Domain Layer - Core market data types and subscription state.
//!
//! This layer contains the value types and in-memory bookkeeping the
//! engine is built on. No I/O happens here.

/// Instrument, ticker, and event value types.
pub mod market;

/// Per-exchange subscription bookkeeping.
pub mod subscription;
