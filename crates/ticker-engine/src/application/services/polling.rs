//! Polling Loop
//!
//! Continuous fetch loop covering every instrument on exchanges without
//! streaming support. Each cycle walks the registry's polling snapshot,
//! fetches a fresh ticker per instrument, and publishes it through the
//! broadcast hub, then sleeps for the configured interval.
//!
//! The loop is deliberately hard to kill: a failed fetch is reported and
//! skipped, and any error escaping a cycle is caught at the loop boundary.
//! Only cancellation of the shutdown token stops it, observed at the
//! inter-cycle sleep so stop latency is bounded by one interval.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExchangeClient, ExchangeResolver};
use crate::domain::market::InstrumentSpec;
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::broadcast::SharedTickerPublisher;
use crate::infrastructure::metrics;

// =============================================================================
// Polling Loop
// =============================================================================

/// Periodic ticker fetcher for polling-only exchanges.
pub struct PollingLoop {
    registry: Arc<SubscriptionRegistry>,
    resolver: Arc<dyn ExchangeResolver>,
    publisher: SharedTickerPublisher,
    interval: Duration,
}

impl PollingLoop {
    /// Create a loop polling the registry's snapshot every `interval`.
    #[must_use]
    pub const fn new(
        registry: Arc<SubscriptionRegistry>,
        resolver: Arc<dyn ExchangeResolver>,
        publisher: SharedTickerPublisher,
        interval: Duration,
    ) -> Self {
        Self {
            registry,
            resolver,
            publisher,
            interval,
        }
    }

    /// Run until `shutdown` is cancelled.
    ///
    /// Polls immediately on entry, then once per interval. Cancellation is
    /// observed at the sleep between cycles; an in-flight cycle always
    /// completes.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(interval = ?self.interval, "Polling loop started");

        loop {
            let started = Instant::now();
            if let Err(error) = self.poll_cycle().await {
                // Loop-level catch: the poller outlives any single bad
                // cycle.
                tracing::error!(error = %error, "Polling cycle failed; continuing");
            }
            metrics::record_poll_cycle_duration(started.elapsed());

            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Polling loop stopped");
    }

    /// Fetch and publish one ticker per polled instrument.
    ///
    /// Per-instrument failures are reported and skipped; one instrument's
    /// error never costs the others their update. With every failure
    /// handled per instrument, the cycle itself currently cannot fail;
    /// the fallible signature keeps the loop-level catch in `run` as the
    /// containment point for any per-cycle work added here later.
    async fn poll_cycle(&self) -> anyhow::Result<()> {
        for spec in self.registry.polling_snapshot() {
            if let Err(error) = self.fetch_and_publish(&spec).await {
                metrics::record_poll_error(&spec.exchange);
                tracing::error!(instrument = %spec, error = %error, "Failed fetching ticker");
            }
        }
        Ok(())
    }

    async fn fetch_and_publish(&self, spec: &InstrumentSpec) -> anyhow::Result<()> {
        let ticker = match self.resolver.resolve(&spec.exchange)? {
            ExchangeClient::Polling(source) => source.fetch_ticker(&spec.pair).await?,
            ExchangeClient::Streaming(_) => {
                anyhow::bail!("exchange {} is streaming-capable but sits in the polling set", spec.exchange)
            }
        };
        let _ = self.publisher.publish(spec.clone(), ticker);
        Ok(())
    }
}

impl std::fmt::Debug for PollingLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingLoop")
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
