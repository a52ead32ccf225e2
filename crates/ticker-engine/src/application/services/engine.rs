//! Ticker Service
//!
//! The engine's lifecycle controller and subscription entry point. Owns
//! the subscription registry, the broadcast hub, the streaming manager,
//! and the background polling task, and exposes the one method embedding
//! processes call to change what is subscribed.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start()--> Running --stop()--> Stopping --> Stopped
//! ```
//!
//! Both transitions are one-way: a stopped service is not restartable.
//! `stop` cancels the polling task and awaits its exit; with the
//! cancellation point at the inter-cycle sleep, stop latency is bounded by
//! one poll interval plus the in-flight cycle.
//!
//! # Reconciliation
//!
//! `update_subscriptions` runs under a process-wide reconcile lock, so
//! concurrent updates serialize and each exchange's teardown/reconnect
//! sequence is never interleaved with another update's.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    ExchangeClient, ExchangeResolver, MarketDataError, UnknownExchange,
};
use crate::application::services::{PollingLoop, StreamingConnectionManager};
use crate::domain::market::{InstrumentSpec, TickerEvent};
use crate::domain::subscription::SubscriptionRegistry;
use crate::infrastructure::broadcast::{SharedTickerPublisher, TickerPublisher};
use crate::infrastructure::config::EngineSettings;
use crate::infrastructure::metrics;

// =============================================================================
// Errors
// =============================================================================

/// Errors from the service's lifecycle and subscription operations.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    /// `start` was called on a service that already left `Idle`.
    #[error("service has already been started")]
    AlreadyStarted,

    /// `stop` was called on a service that is not running.
    #[error("service is not running")]
    NotRunning,

    /// A subscription update named an exchange the resolver does not know.
    #[error(transparent)]
    UnknownExchange(#[from] UnknownExchange),

    /// An instrument was filed under a different exchange's entry.
    #[error("instrument {spec} filed under exchange {exchange}")]
    MisfiledInstrument {
        /// The exchange key the instrument arrived under.
        exchange: String,
        /// The offending instrument.
        spec: InstrumentSpec,
    },

    /// Streaming reconciliation failed for one exchange.
    #[error("streaming reconciliation failed for {exchange}")]
    Streaming {
        /// The exchange whose session could not be reconciled.
        exchange: String,
        /// The underlying client failure.
        #[source]
        source: MarketDataError,
    },
}

// =============================================================================
// Service State
// =============================================================================

/// Observable lifecycle state of a [`TickerService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    /// Created, polling task not yet started.
    Idle,
    /// Polling task running, subscriptions active.
    Running,
    /// `stop` in progress; the polling task is draining.
    Stopping,
    /// Fully stopped. Terminal.
    Stopped,
}

/// Internal worker slot; `Running` additionally owns the task handle.
#[derive(Debug)]
enum Worker {
    Idle,
    Running(JoinHandle<()>),
    Stopping,
    Stopped,
}

impl Worker {
    const fn state(&self) -> ServiceState {
        match self {
            Self::Idle => ServiceState::Idle,
            Self::Running(_) => ServiceState::Running,
            Self::Stopping => ServiceState::Stopping,
            Self::Stopped => ServiceState::Stopped,
        }
    }
}

// =============================================================================
// Ticker Service
// =============================================================================

/// Subscription-driven market data engine.
///
/// # Example
///
/// ```ignore
/// use std::collections::{HashMap, HashSet};
/// use std::sync::Arc;
/// use ticker_engine::application::services::TickerService;
/// use ticker_engine::infrastructure::config::EngineSettings;
///
/// let service = TickerService::new(resolver, EngineSettings::default());
/// let mut events = service.subscribe();
/// service.start()?;
/// service.update_subscriptions(desired).await?;
/// while let Ok(event) = events.recv().await {
///     println!("{}: {}", event.spec, event.ticker.last);
/// }
/// ```
pub struct TickerService {
    resolver: Arc<dyn ExchangeResolver>,
    registry: Arc<SubscriptionRegistry>,
    publisher: SharedTickerPublisher,
    streaming: StreamingConnectionManager,
    settings: EngineSettings,
    reconcile_lock: tokio::sync::Mutex<()>,
    shutdown: CancellationToken,
    worker: parking_lot::Mutex<Worker>,
}

impl TickerService {
    /// Create an idle service resolving exchanges through `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn ExchangeResolver>, settings: EngineSettings) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new());
        let publisher: SharedTickerPublisher =
            Arc::new(TickerPublisher::new(settings.event_capacity));
        let streaming =
            StreamingConnectionManager::new(Arc::clone(&registry), Arc::clone(&publisher));

        Self {
            resolver,
            registry,
            publisher,
            streaming,
            settings,
            reconcile_lock: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
            worker: parking_lot::Mutex::new(Worker::Idle),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ServiceState {
        self.worker.lock().state()
    }

    /// Attach a consumer to the ticker event stream.
    #[must_use]
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<TickerEvent> {
        self.publisher.subscribe()
    }

    /// The registry holding desired and live subscription state.
    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start the background polling task.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::AlreadyStarted`] unless the service is
    /// `Idle`.
    pub fn start(&self) -> Result<(), ServiceError> {
        let mut worker = self.worker.lock();
        if !matches!(*worker, Worker::Idle) {
            return Err(ServiceError::AlreadyStarted);
        }

        tracing::info!("Starting ticker service");
        let poller = PollingLoop::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.resolver),
            Arc::clone(&self.publisher),
            self.settings.poll_interval,
        );
        let handle = tokio::spawn(poller.run(self.shutdown.child_token()));
        *worker = Worker::Running(handle);
        Ok(())
    }

    /// Stop the service and await the polling task's exit.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::NotRunning`] unless the service is
    /// `Running`.
    pub async fn stop(&self) -> Result<(), ServiceError> {
        let handle = {
            let mut worker = self.worker.lock();
            match std::mem::replace(&mut *worker, Worker::Stopping) {
                Worker::Running(handle) => handle,
                previous => {
                    *worker = previous;
                    return Err(ServiceError::NotRunning);
                }
            }
        };

        tracing::info!("Stopping ticker service");
        self.shutdown.cancel();
        if let Err(error) = handle.await {
            tracing::error!(error = %error, "Polling task ended abnormally");
        }

        *self.worker.lock() = Worker::Stopped;
        tracing::info!("Ticker service stopped");
        Ok(())
    }

    // =========================================================================
    // Subscription Updates
    // =========================================================================

    /// Replace the desired instrument set for each exchange in `desired`.
    ///
    /// Exchanges absent from the map keep their current subscriptions.
    /// Streaming-capable exchanges have their session torn down and
    /// rebuilt against the new set (an empty set is teardown-only);
    /// polling-only exchanges have their polled set replaced, picked up by
    /// the loop on its next cycle.
    ///
    /// Serialized process-wide: concurrent callers queue on the reconcile
    /// lock.
    ///
    /// # Errors
    ///
    /// Fails on unknown exchanges, instruments filed under the wrong
    /// exchange key, and streaming client failures. Exchanges processed
    /// before the failure keep their new subscriptions.
    pub async fn update_subscriptions(
        &self,
        desired: HashMap<String, HashSet<InstrumentSpec>>,
    ) -> Result<(), ServiceError> {
        tracing::info!(requested = ?desired, "Updating subscriptions");
        let _guard = self.reconcile_lock.lock().await;

        for (exchange, specs) in desired {
            if let Some(misfiled) = specs.iter().find(|spec| spec.exchange != exchange) {
                return Err(ServiceError::MisfiledInstrument {
                    exchange,
                    spec: misfiled.clone(),
                });
            }

            match self.resolver.resolve(&exchange)? {
                ExchangeClient::Streaming(client) => {
                    tracing::info!(
                        exchange = %exchange,
                        instruments = specs.len(),
                        "Reconciling streaming subscriptions"
                    );
                    self.streaming
                        .reconcile(&client, &exchange, specs)
                        .await
                        .map_err(|source| ServiceError::Streaming { exchange, source })?;
                }
                ExchangeClient::Polling(_) => {
                    tracing::info!(
                        exchange = %exchange,
                        instruments = specs.len(),
                        "Replacing polled instrument set"
                    );
                    self.registry.replace_polling_specs(&exchange, specs);
                    metrics::set_polled_instruments(self.registry.polled_instrument_count() as f64);
                }
            }
        }

        Ok(())
    }
}

impl std::fmt::Debug for TickerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TickerService")
            .field("state", &self.state())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::{
        MockExchangeResolver, MockMarketDataSource, MockStreamingMarketData,
    };
    use crate::domain::market::{CurrencyPair, Ticker};

    fn spec(exchange: &str, base: &str) -> InstrumentSpec {
        InstrumentSpec::new(exchange, CurrencyPair::new(base, "USD"))
    }

    fn service_with(resolver: MockExchangeResolver) -> TickerService {
        TickerService::new(Arc::new(resolver), EngineSettings::default())
    }

    #[tokio::test(start_paused = true)]
    async fn lifecycle_walks_idle_running_stopped() {
        let service = service_with(MockExchangeResolver::new());
        assert_eq!(service.state(), ServiceState::Idle);

        service.start().unwrap();
        assert_eq!(service.state(), ServiceState::Running);

        service.stop().await.unwrap();
        assert_eq!(service.state(), ServiceState::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_single_shot() {
        let service = service_with(MockExchangeResolver::new());
        service.start().unwrap();
        assert!(matches!(service.start(), Err(ServiceError::AlreadyStarted)));

        service.stop().await.unwrap();
        assert!(matches!(service.start(), Err(ServiceError::AlreadyStarted)));
    }

    #[tokio::test]
    async fn stop_requires_running() {
        let service = service_with(MockExchangeResolver::new());
        assert!(matches!(service.stop().await, Err(ServiceError::NotRunning)));
        assert_eq!(service.state(), ServiceState::Idle);
    }

    #[tokio::test]
    async fn unknown_exchange_fails_the_update() {
        let mut resolver = MockExchangeResolver::new();
        resolver
            .expect_resolve()
            .returning(|exchange| Err(UnknownExchange(exchange.to_string())));
        let service = service_with(resolver);

        let result = service
            .update_subscriptions(HashMap::from([(
                "mtgox".to_string(),
                HashSet::from([spec("mtgox", "BTC")]),
            )]))
            .await;

        assert!(matches!(result, Err(ServiceError::UnknownExchange(_))));
    }

    #[tokio::test]
    async fn misfiled_instrument_is_rejected_before_resolution() {
        let mut resolver = MockExchangeResolver::new();
        resolver.expect_resolve().never();
        let service = service_with(resolver);

        let result = service
            .update_subscriptions(HashMap::from([(
                "binance".to_string(),
                HashSet::from([spec("kraken", "BTC")]),
            )]))
            .await;

        assert!(matches!(
            result,
            Err(ServiceError::MisfiledInstrument { .. })
        ));
    }

    #[tokio::test]
    async fn polling_exchange_updates_registry_without_fetching() {
        let mut source = MockMarketDataSource::new();
        source.expect_fetch_ticker().never();
        let client = ExchangeClient::Polling(Arc::new(source));

        let mut resolver = MockExchangeResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_| Ok(client.clone()));
        let service = service_with(resolver);

        service
            .update_subscriptions(HashMap::from([(
                "bitstamp".to_string(),
                HashSet::from([spec("bitstamp", "BTC"), spec("bitstamp", "ETH")]),
            )]))
            .await
            .unwrap();

        assert_eq!(service.registry().polled_instrument_count(), 2);
    }

    #[tokio::test]
    async fn streaming_exchange_opens_a_session() {
        let mut streaming = MockStreamingMarketData::new();
        streaming.expect_connect().once().returning(|_| Ok(()));
        streaming
            .expect_ticker_stream()
            .once()
            .returning(|_| Ok(Box::pin(futures::stream::pending())));
        let client = ExchangeClient::Streaming(Arc::new(streaming));

        let mut resolver = MockExchangeResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_| Ok(client.clone()));
        let service = service_with(resolver);

        service
            .update_subscriptions(HashMap::from([(
                "binance".to_string(),
                HashSet::from([spec("binance", "BTC")]),
            )]))
            .await
            .unwrap();

        assert_eq!(service.registry().live_handle_count("binance"), 1);
    }

    #[tokio::test]
    async fn streaming_failure_names_the_exchange() {
        let mut streaming = MockStreamingMarketData::new();
        streaming
            .expect_connect()
            .returning(|_| Err(MarketDataError::Connection("refused".to_string())));
        let client = ExchangeClient::Streaming(Arc::new(streaming));

        let mut resolver = MockExchangeResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_| Ok(client.clone()));
        let service = service_with(resolver);

        let result = service
            .update_subscriptions(HashMap::from([(
                "binance".to_string(),
                HashSet::from([spec("binance", "BTC")]),
            )]))
            .await;

        match result {
            Err(ServiceError::Streaming { exchange, .. }) => assert_eq!(exchange, "binance"),
            other => panic!("expected streaming error, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn running_service_polls_what_was_subscribed() {
        let mut source = MockMarketDataSource::new();
        source
            .expect_fetch_ticker()
            .returning(|_| Ok(Ticker::from_last(Decimal::from(42))));
        let client = ExchangeClient::Polling(Arc::new(source));

        let mut resolver = MockExchangeResolver::new();
        resolver
            .expect_resolve()
            .returning(move |_| Ok(client.clone()));
        let service = service_with(resolver);
        let mut events = service.subscribe();

        service
            .update_subscriptions(HashMap::from([(
                "bitstamp".to_string(),
                HashSet::from([spec("bitstamp", "BTC")]),
            )]))
            .await
            .unwrap();
        service.start().unwrap();

        let event = events.recv().await.unwrap();
        assert_eq!(event.ticker.last, Decimal::from(42));

        service.stop().await.unwrap();
    }
}
