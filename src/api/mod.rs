//! HTTP/websocket surface: upload endpoint and the subscribe/unsubscribe
//! control protocol.
//!
//! One router exposing `/v1/ws` and a multipart upload endpoint, built on
//! `axum` plus `tower-http` for CORS and request tracing.

mod upload;
mod websocket;

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::sync::mpsc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::RequestError;
use crate::ingest::IngestHandle;
use crate::ports::Broker;

pub use upload::{UploadRecord, UploadRegistry};

/// Shared state behind every request. Generic over the broker adapter so
/// the same router assembly works for both the in-memory and Redis
/// deployments (see `app.rs`).
pub struct AppState<B> {
    /// Handle to the running ingest worker.
    pub ingest: IngestHandle,
    /// Sink for per-subscription ingest failures.
    pub error_tx: mpsc::UnboundedSender<RequestError>,
    /// Pub/sub fabric a fresh [`crate::subscription::SubscriptionManager`] is
    /// built from for each accepted websocket connection.
    pub broker: B,
    /// Directory uploaded trade files are written to.
    pub upload_dir: PathBuf,
    /// Dedup registry for `POST /v1/upload`: a repeat upload of the same
    /// filename returns the existing record unchanged.
    pub uploads: upload::UploadRegistry,
}

/// Assemble the full router: upload, websocket, and ambient middleware.
pub fn router<B>(state: Arc<AppState<B>>) -> Router
where
    B: Broker + Clone + 'static,
    B::Consumer: 'static,
{
    Router::new()
        .route("/v1/upload", post(upload::handle_upload::<B>))
        .route("/v1/ws", get(websocket::ws_handler::<B>))
        .route("/healthz", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
