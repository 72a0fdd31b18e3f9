use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::{Broker, EventCache};
use crate::scheduler::{Selected, SchedulerHandle};
use crate::types::{CachedPayload, Event, EofFrame};

/// How long the publisher waits for new ingest events before retrying
/// `PublishNext` when there was nothing to publish last time around.
const IDLE_WAIT: Duration = Duration::from_millis(5);

/// Spawn the publisher actor. `events` is the ingest-sink receiver: this is
/// how events enter the scheduler.
pub fn spawn<C, B>(
    events: mpsc::Receiver<Event>,
    scheduler: SchedulerHandle,
    cache: C,
    broker: B,
    cancel: CancellationToken,
) where
    C: EventCache + 'static,
    B: Broker + 'static,
{
    tokio::spawn(run(events, scheduler, cache, broker, cancel));
}

async fn run<C, B>(
    mut events: mpsc::Receiver<Event>,
    scheduler: SchedulerHandle,
    cache: C,
    broker: B,
    cancel: CancellationToken,
) where
    C: EventCache,
    B: Broker,
{
    info!("publisher started");

    loop {
        if cancel.is_cancelled() {
            debug!("publisher cancelled, exiting");
            return;
        }

        let ingest_closed = match events.try_recv() {
            Ok(event) => {
                scheduler.put(event).await;
                continue;
            }
            Err(mpsc::error::TryRecvError::Empty) => false,
            Err(mpsc::error::TryRecvError::Disconnected) => true,
        };

        match scheduler.publish_next().await {
            Some(selected) => publish_selected(selected, &cache, &broker, &scheduler).await,
            None if ingest_closed => {
                debug!("ingest sink closed and nothing pending, exiting");
                return;
            }
            None => wait_for_more_work(&mut events, &cancel).await,
        }
    }
}

async fn wait_for_more_work(events: &mut mpsc::Receiver<Event>, cancel: &CancellationToken) {
    tokio::select! {
        biased;
        () = cancel.cancelled() => {}
        _ = events.recv() => {}
        () = tokio::time::sleep(IDLE_WAIT) => {}
    }
}

async fn publish_selected<C, B>(selected: Selected, cache: &C, broker: &B, scheduler: &SchedulerHandle)
where
    C: EventCache,
    B: Broker,
{
    let topic = selected.event_id.request_id().to_string();

    if selected.eof {
        let frame = EofFrame { request_id: topic.clone() };
        let Ok(payload) = serde_json::to_vec(&frame) else {
            warn!(event_id = %selected.event_id, "failed to encode EOF frame");
            return;
        };
        if broker.publish(&topic, &payload).await.is_err() {
            warn!(event_id = %selected.event_id, "broker publish failed, retrying later");
            return;
        }
        scheduler.published(selected.event_id).await;
        // No cache entry exists for EOF; deleting is a harmless no-op that
        // keeps this branch uniform with the data-frame path.
        let _ = cache.delete(&selected.event_id.to_key()).await;
        return;
    }

    let key = selected.event_id.to_key();
    let encoded = match cache.get(&key).await {
        Ok(Some(bytes)) => bytes,
        Ok(None) => {
            warn!(event_id = %selected.event_id, "orphaned scheduler record, no cache entry");
            scheduler.published(selected.event_id).await;
            return;
        }
        Err(error) => {
            warn!(event_id = %selected.event_id, %error, "cache get failed, retrying later");
            return;
        }
    };

    let decoded = match CachedPayload::decode(&encoded) {
        Ok(decoded) => decoded,
        Err(error) => {
            warn!(event_id = %selected.event_id, %error, "failed to decode cached payload");
            scheduler.published(selected.event_id).await;
            let _ = cache.delete(&key).await;
            return;
        }
    };

    let publish_bytes = match &decoded {
        CachedPayload::Order { payload } => serde_json::to_vec(payload),
        CachedPayload::Kline { payload } => serde_json::to_vec(payload),
    };
    let Ok(publish_bytes) = publish_bytes else {
        warn!(event_id = %selected.event_id, "failed to encode payload for publish");
        return;
    };

    if broker.publish(&topic, &publish_bytes).await.is_err() {
        warn!(event_id = %selected.event_id, "broker publish failed, retrying later");
        return;
    }

    scheduler.published(selected.event_id).await;
    let _ = cache.delete(&key).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration as StdDuration;

    use tokio_util::sync::CancellationToken;
    use uuid::Uuid;

    use super::*;
    use crate::ports::{FakeClock, MockBroker, MockEventCache};
    use crate::scheduler;
    use crate::types::{Aggressor, CachedPayload, EventId, Trade};

    #[tokio::test]
    async fn republishes_the_bare_payload_and_clears_the_cache_entry() {
        let cancel = CancellationToken::new();
        let scheduler = scheduler::spawn(FakeClock::epoch(), cancel.clone());
        let cache = std::sync::Arc::new(MockEventCache::new());
        let broker = MockBroker::new();
        let (events_tx, events_rx) = mpsc::channel(8);

        let request_id = Uuid::new_v4();
        let event_id = EventId::new(request_id, 0);
        let trade = Trade {
            price: 100.0,
            quantity: 1,
            aggressor: Aggressor::Bid,
            timestamp: 0,
        };
        cache
            .put_batch(vec![(
                event_id.to_key(),
                CachedPayload::Order { payload: trade }.encode().unwrap(),
            )])
            .await
            .unwrap();
        assert!(
            scheduler
                .put(Event {
                    request_id,
                    seq: 0,
                    deadline: 0,
                    eof: false,
                })
                .await
        );

        // Subscribe before the publisher runs so the message isn't dropped.
        let topic = request_id.to_string();
        let mut consumer = broker.subscribe(&topic).await.unwrap();

        spawn(events_rx, scheduler.clone(), cache.clone(), broker.clone(), cancel.clone());
        drop(events_tx);

        let payload = tokio::time::timeout(StdDuration::from_secs(1), consumer.receive_timeout(StdDuration::from_secs(1)))
            .await
            .unwrap()
            .unwrap()
            .expect("trade republished");
        let decoded: Trade = serde_json::from_slice(&payload).unwrap();
        assert_eq!(decoded, trade);

        assert_eq!(cache.get(&event_id.to_key()).await.unwrap(), None);
        cancel.cancel();
    }

    #[tokio::test]
    async fn publishes_an_eof_frame_for_the_terminal_event() {
        let cancel = CancellationToken::new();
        let scheduler = scheduler::spawn(FakeClock::epoch(), cancel.clone());
        let cache = MockEventCache::new();
        let broker = MockBroker::new();
        let (events_tx, events_rx) = mpsc::channel(8);

        let request_id = Uuid::new_v4();
        assert!(
            scheduler
                .put(Event {
                    request_id,
                    seq: 0,
                    deadline: 0,
                    eof: true,
                })
                .await
        );

        let topic = request_id.to_string();
        let mut consumer = broker.subscribe(&topic).await.unwrap();

        spawn(events_rx, scheduler.clone(), cache, broker, cancel.clone());
        drop(events_tx);

        let payload = tokio::time::timeout(StdDuration::from_secs(1), consumer.receive_timeout(StdDuration::from_secs(1)))
            .await
            .unwrap()
            .unwrap()
            .expect("eof frame published");
        let frame: EofFrame = serde_json::from_slice(&payload).unwrap();
        assert_eq!(frame.request_id, request_id.to_string());
        cancel.cancel();
    }

    #[tokio::test]
    async fn orphaned_record_with_no_cache_entry_is_marked_published_and_skipped() {
        let cancel = CancellationToken::new();
        let scheduler = scheduler::spawn(FakeClock::epoch(), cancel.clone());
        let cache = MockEventCache::new();
        let broker = MockBroker::new();
        let (events_tx, events_rx) = mpsc::channel(8);

        let request_id = Uuid::new_v4();
        let event_id = EventId::new(request_id, 0);
        assert!(
            scheduler
                .put(Event {
                    request_id,
                    seq: 0,
                    deadline: 0,
                    eof: false,
                })
                .await
        );

        spawn(events_rx, scheduler.clone(), cache, broker, cancel.clone());
        drop(events_tx);

        // Give the publisher a moment to observe there is nothing to read
        // from the cache and mark the record published anyway.
        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert!(!scheduler.can_publish(event_id).await);
        cancel.cancel();
    }
}
