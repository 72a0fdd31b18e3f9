//! Timed trade-replay service.
//!
//! Ingests a trade/kline file submitted by a client, schedules each record
//! against a wall-clock deadline derived from its original timestamps, and
//! publishes it to subscribers once that deadline elapses — replaying a
//! historical session at (a multiple of) the rate it originally happened.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                            REPLAY SERVICE                         │
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐   ┌──────────┐ │
//! │  │   Ingest   │──▶│ Scheduler  │──▶│ Publisher  │──▶│  Broker  │ │
//! │  │   Queue    │   │  (deadline │   │  (fan-out  │   │ (pub/sub │ │
//! │  │ (tails the │   │   actor)   │   │  worker)   │   │  fabric) │ │
//! │  │   file)    │   └────────────┘   └────────────┘   └──────────┘ │
//! │  └────────────┘                                           │       │
//! │        ▲                                                  ▼       │
//! │  ┌────────────┐                                   ┌───────────┐  │
//! │  │ EventCache │◀──────────────────────────────────│Subscription│  │
//! │  │ (payload   │                                    │ Manager   │  │
//! │  │  lookup)   │                                    │(per conn) │  │
//! │  └────────────┘                                    └───────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`types`] - Domain types (trades, klines, subscription requests/acks)
//! - [`error`] - Layered error types
//! - [`config`] - Configuration loading and validation
//! - [`ports`] - Trait boundaries (`Clock`, `EventCache`, `Broker`/`Consumer`)
//! - [`cache`] - Event cache adapters (in-memory, Redis)
//! - [`broker`] - Pub/sub broker adapters (in-memory, Redis)
//! - [`scheduler`] - Deadline-ordered replay scheduler
//! - [`ingest`] - File-tailing ingest queue
//! - [`publisher`] - Scheduler-to-broker fan-out worker
//! - [`subscription`] - Per-connection subscription manager
//! - [`api`] - HTTP/websocket surface
//! - [`app`] - Bootstrap wiring
//!
//! # Getting Started
//!
//! ```bash
//! # Set up environment
//! cp .env.example .env
//! # Edit .env with your configuration
//!
//! # Start the service
//! cargo run -- run
//! ```

#![doc(html_root_url = "https://docs.rs/replayd")]

pub mod api;
pub mod app;
pub mod broker;
pub mod cache;
pub mod config;
pub mod error;
pub mod ingest;
pub mod ports;
pub mod publisher;
pub mod scheduler;
pub mod subscription;
pub mod types;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the library version string
#[must_use]
pub const fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
        assert!(version().starts_with("0."));
    }
}
