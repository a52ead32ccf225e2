//! # Ticker Engine
//!
//! Subscription-driven market data engine: tell it which instruments you
//! care about per exchange, and it keeps a live ticker stream flowing —
//! over a push session where the exchange supports one, over a polling
//! loop where it does not — fanning every update out to all attached
//! consumers.
//!
//! ## Architecture
//!
//! Hexagonal layering:
//!
//! - **Domain**: Instrument and ticker types, subscription registry
//! - **Application**: Exchange client ports, reconciliation and polling
//!   services, the [`TickerService`] lifecycle controller
//! - **Infrastructure**: Broadcast hub, configuration, metrics, telemetry
//!
//! ## Data Flow
//!
//! ```text
//! update_subscriptions(desired)
//!        │  (reconcile lock)
//!        ├── streaming exchange ──> disconnect ──> connect ──> one
//!        │                          forwarding task per instrument ─┐
//!        └── polling exchange ────> registry polled set             │
//!                                        │                          │
//!                                  PollingLoop (every interval)     │
//!                                        └──────> TickerPublisher <─┘
//!                                                      │
//!                                            broadcast to consumers
//! ```
//!
//! Exchange access is a port: the embedding process supplies an
//! [`ExchangeResolver`] mapping exchange names to streaming or polling
//! clients, and consumes events via [`TickerService::subscribe`].

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::ports::{
    ExchangeClient, ExchangeResolver, MarketDataError, MarketDataSource, StreamingMarketData,
    TickerStream, UnknownExchange,
};
pub use application::services::{ServiceError, ServiceState, TickerService};
pub use domain::market::{CurrencyPair, InstrumentSpec, Ticker, TickerEvent};
pub use domain::subscription::SubscriptionRegistry;
pub use infrastructure::broadcast::TickerPublisher;
pub use infrastructure::config::EngineSettings;
