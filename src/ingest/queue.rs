use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AppError, DomainError, RequestError};
use crate::ports::{Clock, EventCache};
use crate::types::{CachedPayload, Event, KlineBuilder, SubscriptionName, SubscriptionRequest, Trade};

/// Request-submission channel depth. `1` gives a synchronous handoff where a
/// second `put` waits for the worker to start draining the first.
const REQUEST_CHANNEL_CAPACITY: usize = 1;

/// Extra delay tacked onto the last real deadline for the synthetic EOF event.
const EOF_DEADLINE_PAD_MICROS: i64 = 1000;

#[derive(Debug, Default)]
struct FileRef {
    rc: u64,
}

/// A cheaply-cloneable handle to the running ingest worker.
#[derive(Debug, Clone)]
pub struct IngestHandle {
    requests: Arc<RwLock<HashMap<String, SubscriptionRequest>>>,
    files: Arc<RwLock<HashMap<String, FileRef>>>,
    request_tx: mpsc::Sender<String>,
    stopped: Arc<AtomicBool>,
}

impl IngestHandle {
    /// Validate `request`; on success enqueue it for ingestion and return
    /// `true`. On failure, surface a [`RequestError`] on `error_tx` and
    /// return `false` without touching the worker.
    pub async fn put(&self, request: SubscriptionRequest, error_tx: &mpsc::UnboundedSender<RequestError>) -> bool {
        if let Err(err) = request.validate(|path| Path::new(path).exists()) {
            let _ = error_tx.send(RequestError {
                request_id: request.id.clone(),
                source: AppError::Domain(DomainError::InvalidSubscriptionRequest(err)),
            });
            return false;
        }

        let id = request.id.clone();
        self.requests.write().await.insert(id.clone(), request);

        if self.request_tx.send(id).await.is_err() {
            return false;
        }
        true
    }

    /// Decrement the file-handle refcount for `request_id`'s file; drop the
    /// subscription's request state. Idempotent.
    pub async fn remove(&self, request_id: &str) {
        let filename = self.requests.write().await.remove(request_id).map(|r| r.filename);
        let Some(filename) = filename else {
            return;
        };

        let mut files = self.files.write().await;
        if let Some(fref) = files.get_mut(&filename) {
            if fref.rc <= 1 {
                files.remove(&filename);
            } else {
                fref.rc -= 1;
            }
        }
    }

    /// Cooperatively stop the worker: an in-flight scan tests this flag each
    /// iteration and returns early without emitting further events.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    /// Drain: stop if running, drop all request/file state. Idempotent.
    pub async fn close(&self) {
        self.stop();
        self.requests.write().await.clear();
        self.files.write().await.clear();
    }
}

/// Spawn the ingest worker, returning a handle to it.
///
/// `events` is the sink the worker emits into; the publisher actor owns its
/// receiving end and drains it into the scheduler.
pub fn spawn<C, K>(
    cache: C,
    clock: K,
    events: mpsc::Sender<Event>,
    errors: mpsc::UnboundedSender<RequestError>,
    cancel: CancellationToken,
) -> IngestHandle
where
    C: EventCache + Clone + 'static,
    K: Clock + Clone + 'static,
{
    let (request_tx, request_rx) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
    let handle = IngestHandle {
        requests: Arc::new(RwLock::new(HashMap::new())),
        files: Arc::new(RwLock::new(HashMap::new())),
        request_tx,
        stopped: Arc::new(AtomicBool::new(false)),
    };

    tokio::spawn(run(handle.clone(), request_rx, cache, clock, events, errors, cancel));
    handle
}

#[allow(clippy::too_many_arguments)]
async fn run<C, K>(
    handle: IngestHandle,
    mut request_rx: mpsc::Receiver<String>,
    cache: C,
    clock: K,
    events: mpsc::Sender<Event>,
    errors: mpsc::UnboundedSender<RequestError>,
    cancel: CancellationToken,
) where
    C: EventCache,
    K: Clock,
{
    info!("ingest queue started");

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("ingest queue cancelled, exiting");
                return;
            }

            maybe_id = request_rx.recv() => {
                let Some(request_id) = maybe_id else {
                    debug!("ingest request channel closed, exiting");
                    return;
                };

                if handle.stopped.load(Ordering::SeqCst) {
                    continue;
                }

                if let Err(source) = handle_request(&handle, &request_id, &cache, &clock, &events).await {
                    warn!(request_id = %request_id, error = %source, "ingest request failed");
                    handle.requests.write().await.remove(&request_id);
                    let _ = errors.send(RequestError { request_id, source });
                }
            }
        }
    }
}

async fn handle_request<C, K>(
    handle: &IngestHandle,
    request_id: &str,
    cache: &C,
    clock: &K,
    events: &mpsc::Sender<Event>,
) -> Result<(), AppError>
where
    C: EventCache,
    K: Clock,
{
    let request = handle
        .requests
        .read()
        .await
        .get(request_id)
        .cloned()
        .ok_or_else(|| AppError::Initialization(format!("missing request for request id: {request_id}")))?;

    {
        let mut files = handle.files.write().await;
        files.entry(request.filename.clone()).or_default().rc += 1;
    }

    info!(request_id = %request.id, filename = %request.filename, "reading input file");
    run_scan(handle, &request, cache, clock, events).await
}

async fn run_scan<C, K>(
    handle: &IngestHandle,
    request: &SubscriptionRequest,
    cache: &C,
    clock: &K,
    events: &mpsc::Sender<Event>,
) -> Result<(), AppError>
where
    C: EventCache,
    K: Clock,
{
    let Some(request_uuid) = request.uuid() else {
        return Err(AppError::Initialization(format!("subscription id is not a uuid: {}", request.id)));
    };

    let file = tokio::fs::File::open(&request.filename)
        .await
        .map_err(|source| DomainError::FileOpenError {
            filename: request.filename.clone(),
            source,
        })?;
    let mut lines = BufReader::new(file).lines();

    let start_wall = clock.now_micros();
    let mut base_ts_micros: Option<i64> = None;
    let mut seq: u64 = 0;
    let mut last_deadline = start_wall;
    let mut pairs = Vec::new();
    let mut pending = Vec::new();
    let mut kline_builder = (request.name == SubscriptionName::Kline).then(|| KlineBuilder::new(request.granularity));

    let mut line_no = 0usize;
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|source| DomainError::FileOpenError {
            filename: request.filename.clone(),
            source,
        })?
    {
        if handle.stopped.load(Ordering::SeqCst) {
            return Ok(());
        }

        let trade: Trade = serde_json::from_str(&line).map_err(|source| DomainError::DecodeError {
            filename: request.filename.clone(),
            line_no,
            source,
        })?;
        line_no += 1;

        let trade_ts_micros = trade.timestamp_micros();
        let base = *base_ts_micros.get_or_insert(trade_ts_micros);
        #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
        let deadline = start_wall + (((trade_ts_micros - base) as f64) / f64::from(request.replay_rate)) as i64;
        last_deadline = deadline;

        let payload = match &mut kline_builder {
            Some(builder) => CachedPayload::Kline { payload: builder.fold(&trade) },
            None => CachedPayload::Order { payload: trade },
        };
        let key = format!("{}:{seq}", request.id);
        let encoded = payload
            .encode()
            .map_err(|source| crate::error::InfraError::Cache(crate::error::CacheError::Codec(source)))?;
        pairs.push((key, encoded));
        pending.push(Event {
            request_id: request_uuid,
            seq,
            deadline,
            eof: false,
        });

        seq += 1;
    }

    if !pairs.is_empty() {
        cache.put_batch(pairs).await.map_err(crate::error::InfraError::Cache)?;
    }

    pending.push(Event {
        request_id: request_uuid,
        seq,
        deadline: last_deadline + EOF_DEADLINE_PAD_MICROS,
        eof: true,
    });

    for event in pending {
        if events.send(event).await.is_err() {
            break;
        }
    }

    Ok(())
}
