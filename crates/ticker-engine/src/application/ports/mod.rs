//! Port Interfaces
//!
//! Defines the interfaces (ports) for the exchange clients the engine
//! drives, following the Hexagonal Architecture pattern. Exchange access
//! is an external collaborator: the engine only ever sees these traits,
//! and infrastructure supplies the adapters.
//!
//! ## Driven Ports (Outbound)
//!
//! - `ExchangeResolver`: Look up an exchange client by name
//! - `MarketDataSource`: One-shot request/response price fetch
//! - `StreamingMarketData`: Persistent push connection with per-instrument
//!   ticker streams
//!
//! An exchange is wholly streaming-capable or wholly polling-capable —
//! `ExchangeClient` is an enum, so mixed capability is unrepresentable.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::domain::market::{CurrencyPair, Ticker};

// =============================================================================
// Errors
// =============================================================================

/// Errors surfaced by exchange clients.
#[derive(Debug, thiserror::Error)]
pub enum MarketDataError {
    /// Opening or closing the exchange connection failed.
    #[error("connection failed: {0}")]
    Connection(String),

    /// Subscribing to an instrument's update stream failed.
    #[error("subscribe failed for {pair}: {reason}")]
    Subscribe {
        /// The pair whose subscription failed.
        pair: CurrencyPair,
        /// Client-reported reason.
        reason: String,
    },

    /// A request/response price fetch failed.
    #[error("ticker fetch failed: {0}")]
    Fetch(String),

    /// A live update stream reported an error for one update.
    #[error("stream error: {0}")]
    Stream(String),
}

/// The named exchange is not known to the resolver.
#[derive(Debug, thiserror::Error)]
#[error("unknown exchange: {0}")]
pub struct UnknownExchange(pub String);

// =============================================================================
// Ticker Stream
// =============================================================================

/// A live stream of ticker updates for a single instrument.
///
/// `Err` items represent per-update stream errors; they are reported and
/// do not terminate the stream or affect sibling subscriptions.
pub type TickerStream = Pin<Box<dyn Stream<Item = Result<Ticker, MarketDataError>> + Send>>;

// =============================================================================
// Exchange Client Ports
// =============================================================================

/// Request/response market data access for a polling-only exchange.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Fetch the current ticker for `pair`.
    async fn fetch_ticker(&self, pair: &CurrencyPair) -> Result<Ticker, MarketDataError>;
}

/// Push-based market data access for a streaming-capable exchange.
///
/// The engine drives a strict session lifecycle: `connect` declares
/// interest in exactly the instruments of the session, `ticker_stream` is
/// called once per declared pair, and `disconnect` closes the session
/// before any handles from it are released.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StreamingMarketData: Send + Sync {
    /// Open a streaming session subscribed to exactly `pairs`.
    async fn connect(&self, pairs: &[CurrencyPair]) -> Result<(), MarketDataError>;

    /// Close the current streaming session.
    ///
    /// Awaited to completion before subscription handles are released; at
    /// least one client faults when handles are released first.
    async fn disconnect(&self) -> Result<(), MarketDataError>;

    /// Obtain the live update stream for one pair declared in `connect`.
    async fn ticker_stream(&self, pair: &CurrencyPair) -> Result<TickerStream, MarketDataError>;
}

// =============================================================================
// Capability Resolution
// =============================================================================

/// A connectable exchange client together with its capability.
#[derive(Clone)]
pub enum ExchangeClient {
    /// The exchange supports a persistent push connection.
    Streaming(Arc<dyn StreamingMarketData>),
    /// The exchange only supports request/response fetches.
    Polling(Arc<dyn MarketDataSource>),
}

impl ExchangeClient {
    /// Whether this exchange supports streaming.
    #[must_use]
    pub const fn supports_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

impl std::fmt::Debug for ExchangeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Streaming(_) => f.write_str("ExchangeClient::Streaming"),
            Self::Polling(_) => f.write_str("ExchangeClient::Polling"),
        }
    }
}

/// Looks up exchange clients by name and reports their capability.
#[cfg_attr(test, mockall::automock)]
pub trait ExchangeResolver: Send + Sync {
    /// Resolve `exchange` to a client handle.
    ///
    /// # Errors
    ///
    /// Returns [`UnknownExchange`] if the name is not recognised.
    fn resolve(&self, exchange: &str) -> Result<ExchangeClient, UnknownExchange>;
}

// =============================================================================
// Tests
// =============================================================================
