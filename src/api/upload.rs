//! `POST /v1/upload`: multipart file upload into the configured upload
//! directory.
//!
//! Returns `{id, filepath, size}`, the same shape the websocket streaming
//! upload sub-protocol's server header uses (`websocket.rs`).

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, State};
use parking_lot::Mutex;
use serde::Serialize;
use uuid::Uuid;

use super::AppState;
use crate::error::{ApiError, InfraError};
use crate::ports::Broker;

/// `{id, filepath, size}` — both the upload response and the server-sent
/// header of the streaming upload sub-protocol (`websocket.rs`).
#[derive(Debug, Clone, Serialize)]
pub struct UploadRecord {
    /// Fresh id minted for this upload.
    pub id: String,
    /// Absolute path the file was written to.
    pub filepath: String,
    /// Bytes written.
    pub size: u64,
}

/// Dedup table keyed by destination path: a repeat upload of an existing
/// filename returns the prior record without rewriting the file.
#[derive(Debug, Clone, Default)]
pub struct UploadRegistry {
    records: Arc<Mutex<HashMap<String, UploadRecord>>>,
}

impl UploadRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, filepath: &str) -> Option<UploadRecord> {
        self.records.lock().get(filepath).cloned()
    }

    fn insert(&self, record: UploadRecord) {
        self.records.lock().insert(record.filepath.clone(), record);
    }
}

fn destination(upload_dir: &std::path::Path, filename: &str) -> PathBuf {
    upload_dir.join(filename)
}

/// Handle a multipart upload. The form must carry a `file` field; its
/// `filename` becomes the destination name under `upload_dir`.
///
/// # Errors
/// Returns [`ApiError::BadRequest`] for a malformed multipart body, or a
/// wrapped I/O error if the file could not be written.
pub async fn handle_upload<B>(
    State(state): State<Arc<AppState<B>>>,
    mut multipart: Multipart,
) -> Result<Json<UploadRecord>, ApiError>
where
    B: Broker + Clone + 'static,
    B::Consumer: 'static,
{
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::BadRequest(error.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let dest = destination(&state.upload_dir, &filename);
        let dest_str = dest.to_string_lossy().into_owned();

        if let Some(existing) = state.uploads.get(&dest_str) {
            return Ok(Json(existing));
        }

        tokio::fs::create_dir_all(&state.upload_dir)
            .await
            .map_err(|error| ApiError::App(InfraError::Io(error).into()))?;

        let bytes = field
            .bytes()
            .await
            .map_err(|error| ApiError::BadRequest(error.to_string()))?;
        tokio::fs::write(&dest, &bytes)
            .await
            .map_err(|error| ApiError::App(InfraError::Io(error).into()))?;

        #[allow(clippy::cast_possible_truncation)]
        let size = bytes.len() as u64;
        let record = UploadRecord {
            id: Uuid::new_v4().to_string(),
            filepath: dest_str,
            size,
        };
        state.uploads.insert(record.clone());
        return Ok(Json(record));
    }

    Err(ApiError::BadRequest("missing multipart field \"file\"".to_string()))
}
