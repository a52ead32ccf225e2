//! Market Data Types
//!
//! Core domain types for instruments and price snapshots. These types are
//! exchange-agnostic and represent the canonical internal form of a live
//! price update.
//!
//! `InstrumentSpec` is the key used throughout the engine: equality and
//! hashing are by value (exchange name plus currency pair), never by any
//! connection or handle identity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Currency Pair
// =============================================================================

/// A base/counter currency pair, e.g. `BTC/USD`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CurrencyPair {
    /// Base currency symbol (the asset being priced).
    pub base: String,
    /// Counter currency symbol (the pricing unit).
    pub counter: String,
}

impl CurrencyPair {
    /// Create a new currency pair.
    #[must_use]
    pub fn new(base: impl Into<String>, counter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            counter: counter.into(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.counter)
    }
}

/// Error parsing a currency pair from a string.
#[derive(Debug, thiserror::Error)]
#[error("invalid currency pair (expected BASE/COUNTER): {0}")]
pub struct ParsePairError(String);

impl FromStr for CurrencyPair {
    type Err = ParsePairError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((base, counter)) if !base.is_empty() && !counter.is_empty() => {
                Ok(Self::new(base, counter))
            }
            _ => Err(ParsePairError(s.to_string())),
        }
    }
}

// =============================================================================
// Instrument Spec
// =============================================================================

/// Identifies one tradable instrument: a currency pair on a named exchange.
///
/// Immutable value type; used as the subscription key throughout the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstrumentSpec {
    /// Exchange name, e.g. `"binance"`.
    pub exchange: String,
    /// The traded currency pair.
    pub pair: CurrencyPair,
}

impl InstrumentSpec {
    /// Create a new instrument spec.
    #[must_use]
    pub fn new(exchange: impl Into<String>, pair: CurrencyPair) -> Self {
        Self {
            exchange: exchange.into(),
            pair,
        }
    }
}

impl fmt::Display for InstrumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.exchange, self.pair)
    }
}

// =============================================================================
// Ticker
// =============================================================================

/// A snapshot of market price/volume data for one instrument at a point in
/// time. Opaque to the engine beyond being attached to a spec.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    /// Best bid price, if the exchange reports one.
    pub bid: Option<Decimal>,
    /// Best ask price, if the exchange reports one.
    pub ask: Option<Decimal>,
    /// Last traded price.
    pub last: Decimal,
    /// 24h traded volume, if the exchange reports one.
    pub volume: Option<Decimal>,
    /// Exchange-reported timestamp of the snapshot.
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    /// Create a ticker carrying only a last price, timestamped now.
    #[must_use]
    pub fn from_last(last: Decimal) -> Self {
        Self {
            bid: None,
            ask: None,
            last,
            volume: None,
            timestamp: Utc::now(),
        }
    }
}

// =============================================================================
// Ticker Event
// =============================================================================

/// A price update delivered to consumers: one observed `Ticker` paired with
/// the `InstrumentSpec` it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickerEvent {
    /// The instrument the update is for.
    pub spec: InstrumentSpec,
    /// The observed market snapshot.
    pub ticker: Ticker,
}

impl TickerEvent {
    /// Create a new ticker event.
    #[must_use]
    pub const fn new(spec: InstrumentSpec, ticker: Ticker) -> Self {
        Self { spec, ticker }
    }
}

// =============================================================================
// Tests
// =============================================================================
