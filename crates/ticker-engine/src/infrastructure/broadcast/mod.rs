//! Ticker Event Broadcast
//!
//! Implements the single fan-out point for price updates using a tokio
//! broadcast channel. Every update — whether it arrived over a streaming
//! session or a polling fetch — is wrapped in a [`TickerEvent`] and
//! delivered to all attached consumers.
//!
//! Delivery is fire-and-forget from the producer's perspective: a slow
//! consumer lags and drops on its own receiver; it can never block or
//! crash production. Order is preserved per producing task; no ordering is
//! guaranteed across exchanges or between streaming and polling sources.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::domain::market::{InstrumentSpec, Ticker, TickerEvent};
use crate::infrastructure::metrics;

// =============================================================================
// Publisher
// =============================================================================

/// Fan-out hub for [`TickerEvent`]s.
///
/// # Example
///
/// ```rust
/// use ticker_engine::infrastructure::broadcast::TickerPublisher;
///
/// let publisher = TickerPublisher::new(1024);
/// let mut rx = publisher.subscribe();
///
/// // In producer tasks:
/// // publisher.publish(spec, ticker);
/// ```
#[derive(Debug)]
pub struct TickerPublisher {
    tx: broadcast::Sender<TickerEvent>,
}

impl TickerPublisher {
    /// Default channel capacity.
    pub const DEFAULT_CAPACITY: usize = 10_000;

    /// Create a publisher whose channel buffers up to `capacity` events
    /// per lagging receiver. A zero capacity is treated as 1; the
    /// underlying channel requires at least one slot.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tx: broadcast::channel(capacity.max(1)).0,
        }
    }

    /// Create a publisher with the default capacity.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }

    /// Publish one price update to all consumers.
    ///
    /// Returns the number of receivers the event was delivered to, or
    /// `None` if no consumer is currently attached (not an error; the
    /// event is simply dropped).
    pub fn publish(&self, spec: InstrumentSpec, ticker: Ticker) -> Option<usize> {
        tracing::debug!(instrument = %spec, last = %ticker.last, "Publishing ticker");
        let delivered = self.tx.send(TickerEvent::new(spec, ticker)).ok();
        metrics::record_event_published(delivered.unwrap_or(0) as u64);
        delivered
    }

    /// Get a new receiver for the event stream.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<TickerEvent> {
        self.tx.subscribe()
    }

    /// Number of currently attached consumers.
    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Snapshot of the hub's state for health reporting.
    #[must_use]
    pub fn stats(&self) -> PublisherStats {
        PublisherStats {
            receivers: self.tx.receiver_count(),
            queued: self.tx.len(),
        }
    }
}

/// Point-in-time view of the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherStats {
    /// Currently attached consumers.
    pub receivers: usize,
    /// Events queued for the slowest attached consumer.
    pub queued: usize,
}

/// Shared publisher reference.
pub type SharedTickerPublisher = Arc<TickerPublisher>;

// =============================================================================
// Tests
// =============================================================================
