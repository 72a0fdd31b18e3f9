//! Bootstrap wiring: owns the cache/broker/scheduler/ingest/publisher/HTTP
//! lifetimes and assembles them into a servable [`axum::Router`].
//!
//! The ingest queue, scheduler, and publisher are written generic over
//! `EventCache`/`Broker` (see their module docs); this module is where a
//! concrete adapter pair is chosen and wired together into one running
//! service.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::api::{self, AppState, UploadRegistry};
use crate::broker::{InMemoryBroker, RedisBroker};
use crate::cache::{InMemoryEventCache, RedisEventCache};
use crate::config::Settings;
use crate::error::{AppError, InfraError};
use crate::ports::{Broker, EventCache, SystemClock};
use crate::{ingest, publisher, scheduler};

/// Ingest-sink channel depth: the publisher drains this into the scheduler.
const EVENTS_CHANNEL_CAPACITY: usize = 1024;

/// Build a router backed by the in-process cache and broker adapters —
/// single-node operation without a Redis dependency.
///
/// # Errors
/// Returns [`AppError`] if the cache could not be flushed at startup.
pub async fn build_in_memory(settings: &Settings) -> Result<(Router, CancellationToken), AppError> {
    build(settings, Arc::new(InMemoryEventCache::new()), InMemoryBroker::new()).await
}

/// Build a router backed by Redis: the event cache and the pub/sub broker
/// both live on the connection described by `settings.redis`.
///
/// # Errors
/// Returns [`AppError`] if either Redis connection could not be
/// established, or the cache could not be flushed at startup.
pub async fn build_redis(settings: &Settings) -> Result<(Router, CancellationToken), AppError> {
    let cache = RedisEventCache::connect(&settings.redis)
        .await
        .map_err(InfraError::Cache)?;
    let broker = RedisBroker::connect(&settings.redis)
        .await
        .map_err(InfraError::Broker)?;
    build(settings, cache, broker).await
}

async fn build<C, B>(settings: &Settings, cache: C, broker: B) -> Result<(Router, CancellationToken), AppError>
where
    C: EventCache + Clone + 'static,
    B: Broker + Clone + 'static,
    B::Consumer: 'static,
{
    // A fresh process starts with no replay in flight; any cache entries
    // from a prior run are stale.
    cache.flush_all().await.map_err(InfraError::Cache)?;

    let cancel = CancellationToken::new();
    let clock = SystemClock::new();

    let scheduler = scheduler::spawn(clock, cancel.clone());
    let (events_tx, events_rx) = mpsc::channel(EVENTS_CHANNEL_CAPACITY);
    let (error_tx, error_rx) = mpsc::unbounded_channel();

    let ingest = ingest::spawn(cache.clone(), clock, events_tx, error_tx.clone(), cancel.clone());
    publisher::spawn(events_rx, scheduler, cache, broker.clone(), cancel.clone());
    tokio::spawn(log_ingest_errors(error_rx, cancel.clone()));

    let state = Arc::new(AppState {
        ingest,
        error_tx,
        broker,
        upload_dir: PathBuf::from(&settings.upload_dir),
        uploads: UploadRegistry::new(),
    });

    Ok((api::router(state), cancel))
}

/// Drain the ingest error stream into the log. There is no per-connection
/// owner of these errors once emitted — they're informational, already
/// surfaced to the offending subscription's client by the rejection path in
/// [`crate::ingest::IngestHandle::put`].
async fn log_ingest_errors(mut errors: mpsc::UnboundedReceiver<crate::error::RequestError>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            maybe_err = errors.recv() => {
                match maybe_err {
                    Some(err) => warn!(request_id = %err.request_id, error = %err.source, "ingest request failed"),
                    None => return,
                }
            }
        }
    }
}
