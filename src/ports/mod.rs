//! Port definitions for dependency injection and testability.
//!
//! Ports are trait definitions that describe what the domain layer needs.
//! Following hexagonal architecture, adapters (in the infrastructure layer)
//! implement these traits to provide concrete functionality.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Domain Layer                            │
//! │                                                                 │
//! │  Uses ports (traits) to define what it needs                   │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────┐            │
//! │  │ EventCache  │  │   Broker    │  │    Clock    │            │
//! │  └──────┬──────┘  └──────┬──────┘  └──────┬──────┘            │
//! │         │                │                │                    │
//! └─────────┼────────────────┼────────────────┼────────────────────┘
//!           │                │                │
//!           ▼                ▼                ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Infrastructure Layer                        │
//! │                                                                 │
//! │  Provides adapters (implementations) for ports                 │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐                              │
//! │  │RedisEventCache│ │ RedisBroker │                             │
//! │  │InMemoryEventCache│ InMemoryBroker│                           │
//! │  └─────────────┘  └─────────────┘                              │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Port Categories
//!
//! | Category | Ports | Purpose |
//! |----------|-------|---------|
//! | Caching | [`EventCache`] | Payload storage between ingest and publish |
//! | Streaming | [`Broker`], [`Consumer`] | Event fan-out to subscribers |
//! | Time | [`Clock`] | Testable time operations |
//!
//! # Usage
//!
//! ```ignore
//! use replayd::ports::{Clock, EventCache};
//!
//! // Application code depends on traits, not implementations
//! async fn publish_due<C: EventCache, K: Clock>(cache: &C, clock: &K) {
//!     let now = clock.now_micros();
//!     // ...
//! }
//!
//! // In production, use real implementations
//! let cache = RedisEventCache::connect(&settings.redis).await?;
//!
//! // In tests, use mocks
//! let cache = MockEventCache::new();
//! ```

mod broker;
mod cache;
mod clock;

pub use broker::{Broker, Consumer};
pub use cache::EventCache;
pub use clock::{Clock, SystemClock};

// Re-export test utilities for tests and downstream crates using test-utils feature
#[cfg(any(test, feature = "test-utils"))]
pub use broker::mocks::MockBroker;
#[cfg(any(test, feature = "test-utils"))]
pub use cache::mocks::MockEventCache;
#[cfg(any(test, feature = "test-utils"))]
pub use clock::FakeClock;
