//! Subscription Registry
//!
//! In-memory bookkeeping for the engine's desired and live subscription
//! state, tracked per exchange. Pure state, no I/O.
//!
//! # Design
//!
//! The registry tracks, per exchange:
//! - the set of instrument specs currently subscribed via streaming
//! - the live handles delivering those streams (one per instrument)
//! - the set of instrument specs covered by the polling loop
//!
//! Streaming state and polling state never interact for the same exchange:
//! an exchange is wholly streaming-capable or wholly polling-capable.
//!
//! # Concurrency
//!
//! Reads are safe from any task (polling loop, health reporting). All
//! mutation happens under the engine's process-wide reconcile lock, so the
//! inner `RwLock`s only ever see one writer at a time; they exist to make
//! lock-free-style concurrent reads sound. The polling loop reads its
//! snapshot without the reconcile lock — a spec added mid-cycle is simply
//! picked up on the next pass.

use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;
use tokio::task::JoinHandle;

use crate::domain::market::InstrumentSpec;

// =============================================================================
// Stream Handle
// =============================================================================

/// An active per-instrument streaming subscription.
///
/// Owns the forwarding task that reads the instrument's update stream and
/// publishes events. Must be explicitly released to stop receiving data;
/// the registry retains every handle it is given until `clear_handles`
/// returns them for release.
#[derive(Debug)]
pub struct StreamHandle {
    spec: InstrumentSpec,
    task: JoinHandle<()>,
}

impl StreamHandle {
    /// Create a handle owning the forwarding task for `spec`.
    #[must_use]
    pub const fn new(spec: InstrumentSpec, task: JoinHandle<()>) -> Self {
        Self { spec, task }
    }

    /// The instrument this handle delivers updates for.
    #[must_use]
    pub const fn spec(&self) -> &InstrumentSpec {
        &self.spec
    }

    /// Release the subscription: the forwarding task is aborted and no
    /// further events are published for this handle.
    pub fn release(self) {
        self.task.abort();
    }
}

// =============================================================================
// Per-Exchange State
// =============================================================================

/// Streaming subscription state for one exchange.
///
/// Entries are created lazily on first use and persist for the life of the
/// process. `live_handles` is non-empty only while `streaming_specs` is
/// non-empty; the engine never holds a connection with zero subscriptions.
#[derive(Debug, Default)]
struct ExchangeSubscriptionState {
    streaming_specs: HashSet<InstrumentSpec>,
    live_handles: Vec<StreamHandle>,
}

// =============================================================================
// Subscription Registry
// =============================================================================

/// Holds the engine's desired and live subscription state per exchange.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    streaming: RwLock<HashMap<String, ExchangeSubscriptionState>>,
    polling: RwLock<HashMap<String, HashSet<InstrumentSpec>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Streaming State
    // =========================================================================

    /// Read-only snapshot of the specs currently subscribed via streaming
    /// for `exchange`. Empty if the exchange has never been subscribed.
    #[must_use]
    pub fn current_streaming_specs(&self, exchange: &str) -> HashSet<InstrumentSpec> {
        self.streaming
            .read()
            .get(exchange)
            .map(|state| state.streaming_specs.clone())
            .unwrap_or_default()
    }

    /// Overwrite the tracked streaming set for `exchange`.
    ///
    /// Does not itself touch connections; callers sequence teardown and
    /// reconnect around this.
    pub fn replace_streaming_specs(&self, exchange: &str, specs: HashSet<InstrumentSpec>) {
        self.streaming
            .write()
            .entry(exchange.to_string())
            .or_default()
            .streaming_specs = specs;
    }

    /// Store the live handles for `exchange`'s current streaming session.
    pub fn record_handles(&self, exchange: &str, handles: Vec<StreamHandle>) {
        self.streaming
            .write()
            .entry(exchange.to_string())
            .or_default()
            .live_handles = handles;
    }

    /// Remove and return `exchange`'s live handles, leaving an empty slot.
    ///
    /// The caller owns the returned handles and is responsible for
    /// releasing them after the exchange connection has been closed.
    #[must_use]
    pub fn clear_handles(&self, exchange: &str) -> Vec<StreamHandle> {
        self.streaming
            .write()
            .get_mut(exchange)
            .map(|state| std::mem::take(&mut state.live_handles))
            .unwrap_or_default()
    }

    /// Number of live streaming handles held for `exchange`.
    #[must_use]
    pub fn live_handle_count(&self, exchange: &str) -> usize {
        self.streaming
            .read()
            .get(exchange)
            .map_or(0, |state| state.live_handles.len())
    }

    // =========================================================================
    // Polling State
    // =========================================================================

    /// Replace the polled instrument set for `exchange`.
    ///
    /// Instruments omitted from `specs` are pruned; exchanges not named in
    /// an update keep their existing polled set.
    pub fn replace_polling_specs(&self, exchange: &str, specs: HashSet<InstrumentSpec>) {
        self.polling.write().insert(exchange.to_string(), specs);
    }

    /// Snapshot of every polled instrument across all exchanges.
    ///
    /// Taken without the engine's reconcile lock; "eventually polled" is
    /// the only consistency the polling loop needs.
    #[must_use]
    pub fn polling_snapshot(&self) -> Vec<InstrumentSpec> {
        self.polling
            .read()
            .values()
            .flat_map(|specs| specs.iter().cloned())
            .collect()
    }

    /// Total number of polled instruments across all exchanges.
    #[must_use]
    pub fn polled_instrument_count(&self) -> usize {
        self.polling.read().values().map(HashSet::len).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::market::CurrencyPair;

    fn spec(exchange: &str, base: &str) -> InstrumentSpec {
        InstrumentSpec::new(exchange, CurrencyPair::new(base, "USD"))
    }

    fn dummy_handle(s: InstrumentSpec) -> StreamHandle {
        StreamHandle::new(s, tokio::spawn(std::future::pending::<()>()))
    }

    #[test]
    fn streaming_specs_default_empty() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.current_streaming_specs("binance").is_empty());
        assert_eq!(registry.live_handle_count("binance"), 0);
    }

    #[test]
    fn replace_streaming_specs_overwrites() {
        let registry = SubscriptionRegistry::new();

        registry.replace_streaming_specs(
            "binance",
            HashSet::from([spec("binance", "BTC"), spec("binance", "ETH")]),
        );
        assert_eq!(registry.current_streaming_specs("binance").len(), 2);

        registry.replace_streaming_specs("binance", HashSet::from([spec("binance", "LTC")]));
        let current = registry.current_streaming_specs("binance");
        assert_eq!(current, HashSet::from([spec("binance", "LTC")]));
    }

    #[test]
    fn streaming_state_is_exchange_local() {
        let registry = SubscriptionRegistry::new();

        registry.replace_streaming_specs("binance", HashSet::from([spec("binance", "BTC")]));
        assert!(registry.current_streaming_specs("kraken").is_empty());
    }

    #[tokio::test]
    async fn clear_handles_returns_previous_and_empties_slot() {
        let registry = SubscriptionRegistry::new();

        registry.record_handles(
            "binance",
            vec![
                dummy_handle(spec("binance", "BTC")),
                dummy_handle(spec("binance", "ETH")),
            ],
        );
        assert_eq!(registry.live_handle_count("binance"), 2);

        let previous = registry.clear_handles("binance");
        assert_eq!(previous.len(), 2);
        assert_eq!(registry.live_handle_count("binance"), 0);

        for handle in previous {
            handle.release();
        }
    }

    #[tokio::test]
    async fn clear_handles_on_unknown_exchange_is_empty() {
        let registry = SubscriptionRegistry::new();
        assert!(registry.clear_handles("unknown").is_empty());
    }

    #[tokio::test]
    async fn released_handle_aborts_its_task() {
        let task = tokio::spawn(std::future::pending::<()>());
        let probe = StreamHandle::new(spec("binance", "BTC"), task);

        probe.release();
        // Abort is asynchronous; yield so the runtime observes it.
        tokio::task::yield_now().await;
    }

    #[test]
    fn polling_replace_prunes_omitted_instruments() {
        let registry = SubscriptionRegistry::new();

        registry.replace_polling_specs(
            "bitstamp",
            HashSet::from([spec("bitstamp", "BTC"), spec("bitstamp", "ETH")]),
        );
        assert_eq!(registry.polled_instrument_count(), 2);

        registry.replace_polling_specs("bitstamp", HashSet::from([spec("bitstamp", "ETH")]));
        assert_eq!(
            registry.polling_snapshot(),
            vec![spec("bitstamp", "ETH")]
        );
    }

    #[test]
    fn polling_update_leaves_other_exchanges_untouched() {
        let registry = SubscriptionRegistry::new();

        registry.replace_polling_specs("bitstamp", HashSet::from([spec("bitstamp", "BTC")]));
        registry.replace_polling_specs("gemini", HashSet::from([spec("gemini", "ETH")]));

        registry.replace_polling_specs("bitstamp", HashSet::new());

        assert_eq!(registry.polling_snapshot(), vec![spec("gemini", "ETH")]);
    }

    #[test]
    fn polling_snapshot_spans_exchanges() {
        let registry = SubscriptionRegistry::new();

        registry.replace_polling_specs("bitstamp", HashSet::from([spec("bitstamp", "BTC")]));
        registry.replace_polling_specs("gemini", HashSet::from([spec("gemini", "ETH")]));

        let snapshot: HashSet<_> = registry.polling_snapshot().into_iter().collect();
        assert_eq!(
            snapshot,
            HashSet::from([spec("bitstamp", "BTC"), spec("gemini", "ETH")])
        );
    }
}
