//! Layered error types for the replay service.
//!
//! - [`DomainError`] - business logic violations (bad subscription, duplicate event)
//! - [`CacheError`] / [`BrokerError`] - the two external collaborators
//! - [`InfraError`] - infrastructure errors, wrapping the above
//! - [`AppError`] - application-level errors combining domain and infra
//! - [`ApiError`] - HTTP API errors with status codes
//!
//! # Error Philosophy
//!
//! Domain errors are recoverable and surfaced to the client on a
//! per-subscription basis. Infrastructure errors are logged; most are fatal
//! at startup and retried-then-fatal in steady state for the cache, and
//! silently retried for the broker.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::types::EventId;

// ═══════════════════════════════════════════════════════════════════════════════
// DOMAIN ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Domain-level errors: subscription validation and scheduler invariants.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DomainError {
    /// A subscription request failed validation.
    #[error(transparent)]
    InvalidSubscriptionRequest(#[from] crate::types::InvalidSubscriptionRequest),

    /// `Scheduler::Put` rejected a duplicate event id.
    #[error("duplicate event id: {0}")]
    DuplicateEventId(EventId),

    /// A scheduler operation referenced an id with no record.
    #[error("unknown event id: {0}")]
    UnknownEventId(EventId),

    /// The trade file referenced by a subscription could not be opened.
    #[error("failed to open trade file {filename}: {source}")]
    FileOpenError {
        /// The file that could not be opened.
        filename: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line of the trade file was not valid JSON.
    #[error("failed to decode trade line {line_no} of {filename}: {source}")]
    DecodeError {
        /// The file being scanned.
        filename: String,
        /// 0-based line number.
        line_no: usize,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },
}

// ═══════════════════════════════════════════════════════════════════════════════
// EXTERNAL COLLABORATOR ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Errors from the event cache.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The cache could not be reached (connect, ping, or flush failed).
    #[error("cache unavailable: {0}")]
    Unavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A batch `PutBatch`/MSET call failed.
    #[error("cache batch put failed: {0}")]
    PutFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A `Get` found no value for the key (not necessarily an error to the
    /// caller — the publisher treats this as "orphaned record, skip").
    #[error("key not found in cache")]
    NotFound,

    /// Serializing or deserializing a cached payload failed.
    #[error("cache payload codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors from the broker.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrokerError {
    /// The broker rejected a publish.
    #[error("broker publish failed: {0}")]
    PublishFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Subscribing to a topic failed.
    #[error("broker subscribe failed: {0}")]
    SubscribeFailed(#[source] Box<dyn std::error::Error + Send + Sync>),
}

// ═══════════════════════════════════════════════════════════════════════════════
// INFRASTRUCTURE ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Infrastructure-level errors from external systems.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum InfraError {
    /// Event cache error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Broker error.
    #[error(transparent)]
    Broker(#[from] BrokerError),

    /// Filesystem I/O error outside of a specific subscription's trade file
    /// (e.g. the upload directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// APPLICATION ERRORS
// ═══════════════════════════════════════════════════════════════════════════════

/// Application-level errors combining domain and infrastructure errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppError {
    /// Domain logic error.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Infrastructure error.
    #[error(transparent)]
    Infra(#[from] InfraError),

    /// Bootstrap-time initialization error.
    #[error("initialization error: {0}")]
    Initialization(String),

    /// Graceful shutdown requested.
    #[error("shutdown requested")]
    ShutdownRequested,
}

/// Type alias for application Results.
pub type Result<T> = std::result::Result<T, AppError>;

/// An error tied to one subscription, surfaced on the ingest error stream and
/// consumed by the Subscription Manager.
#[derive(Debug, Error)]
#[error("request {request_id}: {source}")]
pub struct RequestError {
    /// The subscription this error pertains to.
    pub request_id: String,
    /// The underlying error.
    #[source]
    pub source: AppError,
}

// ═══════════════════════════════════════════════════════════════════════════════
// API ERRORS (HTTP-specific)
// ═══════════════════════════════════════════════════════════════════════════════

/// API-level errors with HTTP status codes.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Wrapped application error.
    #[error(transparent)]
    App(#[from] AppError),

    /// Invalid request parameters (malformed multipart upload, etc.).
    #[error("invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            Self::App(AppError::Domain(DomainError::InvalidSubscriptionRequest(_)))
            | Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", self.to_string()),

            Self::App(AppError::Domain(
                DomainError::FileOpenError { .. } | DomainError::UnknownEventId(_),
            )) => (StatusCode::NOT_FOUND, "NOT_FOUND", self.to_string()),

            Self::App(_) => {
                tracing::error!(error = ?self, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "internal error".to_string(),
                )
            }
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message
                }
            })),
        )
            .into_response()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
