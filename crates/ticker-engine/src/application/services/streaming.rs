//! Streaming Connection Manager
//!
//! Reconciles the desired instrument set for a streaming-capable exchange
//! against its live session. Reconciliation is teardown-then-rebuild: the
//! previous session is fully closed before a fresh one is opened with
//! exactly the new instrument set, so the exchange connection never
//! carries subscriptions the engine no longer wants.
//!
//! Callers serialize invocations through the engine's reconcile lock; this
//! type itself performs no cross-exchange locking.

use std::collections::HashSet;
use std::sync::Arc;

use futures::StreamExt;

use crate::application::ports::{MarketDataError, StreamingMarketData, TickerStream};
use crate::domain::market::InstrumentSpec;
use crate::domain::subscription::{StreamHandle, SubscriptionRegistry};
use crate::infrastructure::broadcast::SharedTickerPublisher;
use crate::infrastructure::metrics;

// =============================================================================
// Streaming Connection Manager
// =============================================================================

/// Drives streaming session lifecycles for the engine.
#[derive(Debug)]
pub struct StreamingConnectionManager {
    registry: Arc<SubscriptionRegistry>,
    publisher: SharedTickerPublisher,
}

impl StreamingConnectionManager {
    /// Create a manager recording state in `registry` and publishing
    /// received updates through `publisher`.
    #[must_use]
    pub const fn new(registry: Arc<SubscriptionRegistry>, publisher: SharedTickerPublisher) -> Self {
        Self {
            registry,
            publisher,
        }
    }

    /// Reconcile `exchange`'s live session with `desired`.
    ///
    /// Tears down the previous session (if any), records `desired` as the
    /// new subscribed set, and — unless `desired` is empty — opens a new
    /// session and spawns one forwarding task per instrument. An empty
    /// `desired` set is a pure teardown: the exchange is left disconnected
    /// with no live handles.
    ///
    /// # Errors
    ///
    /// Propagates client failures from `disconnect`, `connect`, and
    /// `ticker_stream`. On a partial failure the registry reflects exactly
    /// the handles that were established and a later reconcile tears them
    /// down normally; if no handle was established at all, the just-opened
    /// session is closed before the error propagates so the exchange never
    /// holds a connection with zero subscriptions.
    pub async fn reconcile(
        &self,
        client: &Arc<dyn StreamingMarketData>,
        exchange: &str,
        desired: HashSet<InstrumentSpec>,
    ) -> Result<(), MarketDataError> {
        let had_session = self.teardown(client, exchange).await?;

        self.registry
            .replace_streaming_specs(exchange, desired.clone());

        if desired.is_empty() {
            metrics::set_streaming_subscriptions(exchange, 0.0);
            return Ok(());
        }

        if had_session {
            metrics::record_reconnect(exchange);
        }
        self.connect(client, exchange, desired).await
    }

    /// Close `exchange`'s current session, if one exists.
    ///
    /// Returns whether a session was actually torn down. The connection is
    /// closed before any handle is released; at least one client faults
    /// when handles are released first.
    async fn teardown(
        &self,
        client: &Arc<dyn StreamingMarketData>,
        exchange: &str,
    ) -> Result<bool, MarketDataError> {
        let previous = self.registry.clear_handles(exchange);
        if previous.is_empty() {
            return Ok(false);
        }

        tracing::info!(exchange, handles = previous.len(), "Closing streaming session");
        client.disconnect().await?;

        for handle in previous {
            handle.release();
        }
        Ok(true)
    }

    /// Open a fresh session for `desired` and spawn its forwarding tasks.
    async fn connect(
        &self,
        client: &Arc<dyn StreamingMarketData>,
        exchange: &str,
        desired: HashSet<InstrumentSpec>,
    ) -> Result<(), MarketDataError> {
        let pairs: Vec<_> = desired.iter().map(|spec| spec.pair.clone()).collect();
        tracing::info!(exchange, instruments = pairs.len(), "Opening streaming session");
        client.connect(&pairs).await?;

        let mut handles = Vec::with_capacity(desired.len());
        for spec in desired {
            match client.ticker_stream(&spec.pair).await {
                Ok(stream) => {
                    let task = tokio::spawn(forward_updates(
                        spec.clone(),
                        stream,
                        Arc::clone(&self.publisher),
                    ));
                    handles.push(StreamHandle::new(spec, task));
                }
                Err(error) => {
                    if handles.is_empty() {
                        // No handles means the next teardown would skip
                        // disconnect; close the fresh session now. The
                        // subscribe error stays the primary failure.
                        if let Err(disconnect_error) = client.disconnect().await {
                            tracing::error!(
                                exchange,
                                error = %disconnect_error,
                                "Failed closing session after subscribe failure"
                            );
                        }
                    } else {
                        // Record what was established so the next reconcile
                        // can tear it down.
                        self.registry.record_handles(exchange, handles);
                    }
                    return Err(error);
                }
            }
        }

        metrics::set_streaming_subscriptions(exchange, handles.len() as f64);
        self.registry.record_handles(exchange, handles);
        Ok(())
    }
}

// =============================================================================
// Forwarding Task
// =============================================================================

/// Pump one instrument's update stream into the broadcast hub.
///
/// Runs until the stream ends or the owning [`StreamHandle`] is released.
/// A per-update `Err` is reported and skipped; it never terminates the
/// task or disturbs sibling instruments.
async fn forward_updates(
    spec: InstrumentSpec,
    mut stream: TickerStream,
    publisher: SharedTickerPublisher,
) {
    while let Some(update) = stream.next().await {
        match update {
            Ok(ticker) => {
                let _ = publisher.publish(spec.clone(), ticker);
            }
            Err(error) => {
                metrics::record_stream_error(&spec.exchange);
                tracing::error!(instrument = %spec, error = %error, "Ticker stream error");
            }
        }
    }
    tracing::debug!(instrument = %spec, "Ticker stream ended");
}

// =============================================================================
// Tests
// =============================================================================
