//! Ingest Queue: one logical scan-and-schedule job per subscription.
//!
//! Each subscription tails its file, batching records and emitting them into
//! the scheduler. The file-handle refcount table is tracked as metadata
//! only — each subscription opens its own handle rather than sharing one
//! `tokio::fs::File` across concurrent seeks.

mod queue;

pub use queue::{IngestHandle, spawn};
