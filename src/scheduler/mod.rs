//! Replay Scheduler: the single actor that decides when an event fires.
//!
//! A `Put`/`CanPublish`/`Published`/`PublishNext` request/response quartet
//! runs over an `mpsc` command channel with `oneshot` reply channels.
//! Serializing all scheduler state behind one actor is the chosen answer to
//! "many independent subscriptions, one shared clock" — it obviates
//! per-subscription locks.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use crate::ports::Clock;
use crate::types::{Event, EventId};

/// How often the scheduler sweeps published records for garbage collection.
const GC_INTERVAL: Duration = Duration::from_millis(100);

/// Request channel depth. Generous: callers are the ingest and publisher
/// actors, not a fan-in of many external clients.
const COMMAND_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Record {
    event: Event,
    can_publish: bool,
    published: bool,
}

/// Result of a successful [`SchedulerHandle::publish_next`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selected {
    /// The selected event's identity.
    pub event_id: EventId,
    /// Its deadline.
    pub deadline: i64,
    /// Whether it is the terminal EOF marker.
    pub eof: bool,
}

#[derive(Debug)]
enum Command {
    Put {
        event: Event,
        respond: oneshot::Sender<bool>,
    },
    CanPublish {
        id: EventId,
        respond: oneshot::Sender<bool>,
    },
    Published {
        id: EventId,
        respond: oneshot::Sender<bool>,
    },
    PublishNext {
        respond: oneshot::Sender<Option<Selected>>,
    },
}

/// A cheaply-cloneable handle to a running scheduler actor.
///
/// No component holds a reference to the actor's internal map — all access
/// goes through these request/response calls, which is what breaks the
/// ingest ↔ scheduler ↔ publisher reference cycle.
#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
}

impl SchedulerHandle {
    /// Insert a new event.
    ///
    /// Returns `false` if an event with this identity is already present —
    /// the scheduler's duplicate-id rejection.
    pub async fn put(&self, event: Event) -> bool {
        let (respond, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::Put { event, respond })
            .await
            .is_err()
        {
            return false;
        }
        recv.await.unwrap_or(false)
    }

    /// `true` iff `id` is present and not yet published.
    pub async fn can_publish(&self, id: EventId) -> bool {
        let (respond, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::CanPublish { id, respond })
            .await
            .is_err()
        {
            return false;
        }
        recv.await.unwrap_or(false)
    }

    /// Mark `id` published. Returns `false` if unknown.
    pub async fn published(&self, id: EventId) -> bool {
        let (respond, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::Published { id, respond })
            .await
            .is_err()
        {
            return false;
        }
        recv.await.unwrap_or(false)
    }

    /// Select the next eligible event, against the scheduler's own clock.
    ///
    /// Does not itself mark the event published — callers must do that once
    /// the publish actually succeeds, so a failed publish can be retried
    /// without losing the event's place in line. Returns `None` if nothing
    /// is both ready and past its deadline.
    pub async fn publish_next(&self) -> Option<Selected> {
        let (respond, recv) = oneshot::channel();
        if self
            .commands
            .send(Command::PublishNext { respond })
            .await
            .is_err()
        {
            return None;
        }
        recv.await.ok().flatten()
    }
}

/// Spawn the scheduler actor, returning a handle to it.
///
/// The task runs until `cancel` is triggered, at which point it exits its
/// select loop and drops its state.
pub fn spawn(clock: impl Clock + 'static, cancel: CancellationToken) -> SchedulerHandle {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    tokio::spawn(run(rx, clock, cancel));
    SchedulerHandle { commands: tx }
}

async fn run(mut commands: mpsc::Receiver<Command>, clock: impl Clock, cancel: CancellationToken) {
    let mut events: HashMap<EventId, Record> = HashMap::new();
    let mut gc_tick = tokio::time::interval(GC_INTERVAL);

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                tracing::debug!("scheduler actor cancelled, exiting");
                return;
            }

            _ = gc_tick.tick() => {
                events.retain(|_, record| !record.published);
            }

            maybe_command = commands.recv() => {
                let Some(command) = maybe_command else {
                    tracing::debug!("scheduler command channel closed, exiting");
                    return;
                };
                handle_command(&mut events, command, &clock);
            }
        }
    }
}

fn handle_command(events: &mut HashMap<EventId, Record>, command: Command, clock: &impl Clock) {
    match command {
        Command::Put { event, respond } => {
            let id = event.id();
            let inserted = if events.contains_key(&id) {
                false
            } else {
                events.insert(
                    id,
                    Record {
                        event,
                        can_publish: true,
                        published: false,
                    },
                );
                true
            };
            let _ = respond.send(inserted);
        }

        Command::CanPublish { id, respond } => {
            let ready = events
                .get(&id)
                .is_some_and(|record| record.can_publish && !record.published);
            let _ = respond.send(ready);
        }

        Command::Published { id, respond } => {
            let found = if let Some(record) = events.get_mut(&id) {
                record.published = true;
                true
            } else {
                false
            };
            let _ = respond.send(found);
        }

        Command::PublishNext { respond } => {
            let selected = select_next(events, clock.now_micros());
            let _ = respond.send(selected);
        }
    }
}

/// Selection rule: over records with `!published && can_publish`, pick the
/// one whose `deadline <= now` and whose `deadline` is minimal; tiebreak by
/// lexicographically least `event_id` (`request_id`, then `seq`).
fn select_next(events: &HashMap<EventId, Record>, now_micros: i64) -> Option<Selected> {
    events
        .iter()
        .filter(|(_, record)| record.can_publish && !record.published)
        .filter(|(_, record)| record.event.deadline <= now_micros)
        .min_by(|(id_a, rec_a), (id_b, rec_b)| {
            rec_a
                .event
                .deadline
                .cmp(&rec_b.event.deadline)
                .then_with(|| id_a.cmp(id_b))
                .then(Ordering::Equal)
        })
        .map(|(id, record)| Selected {
            event_id: *id,
            deadline: record.event.deadline,
            eof: record.event.eof,
        })
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::ports::FakeClock;

    fn event(request_id: Uuid, seq: u64, deadline: i64, eof: bool) -> Event {
        Event {
            request_id,
            seq,
            deadline,
            eof,
        }
    }

    #[tokio::test]
    async fn put_rejects_duplicate_id() {
        let cancel = CancellationToken::new();
        let handle = spawn(FakeClock::epoch(), cancel.clone());
        let request_id = Uuid::new_v4();

        assert!(handle.put(event(request_id, 0, 100, false)).await);
        assert!(!handle.put(event(request_id, 0, 200, false)).await);
        cancel.cancel();
    }

    #[tokio::test]
    async fn publish_next_selects_minimal_deadline_with_tiebreak() {
        let cancel = CancellationToken::new();
        let clock = std::sync::Arc::new(FakeClock::epoch());
        let handle = spawn(clock.clone(), cancel.clone());

        let low_id = Uuid::from_u128(1);
        let high_id = Uuid::from_u128(2);
        handle.put(event(high_id, 0, 100, false)).await;
        handle.put(event(low_id, 0, 100, false)).await;

        clock.set_micros(1_000);
        let selected = handle.publish_next().await.unwrap();
        assert_eq!(selected.event_id, EventId::new(low_id, 0));
        cancel.cancel();
    }

    #[tokio::test]
    async fn publish_next_ignores_events_not_yet_due() {
        let cancel = CancellationToken::new();
        let clock = std::sync::Arc::new(FakeClock::epoch());
        let handle = spawn(clock.clone(), cancel.clone());
        handle.put(event(Uuid::new_v4(), 0, 1_000_000, false)).await;

        assert!(handle.publish_next().await.is_none());
        cancel.cancel();
    }

    #[tokio::test]
    async fn event_remains_selectable_between_publish_next_and_published() {
        let cancel = CancellationToken::new();
        let clock = std::sync::Arc::new(FakeClock::epoch());
        let handle = spawn(clock.clone(), cancel.clone());
        let request_id = Uuid::new_v4();
        handle.put(event(request_id, 0, 0, false)).await;

        let first = handle.publish_next().await.unwrap();
        let second = handle.publish_next().await.unwrap();
        assert_eq!(first.event_id, second.event_id);

        assert!(handle.published(first.event_id).await);
        assert!(handle.publish_next().await.is_none());
        cancel.cancel();
    }

    #[tokio::test]
    async fn can_publish_false_once_published() {
        let cancel = CancellationToken::new();
        let handle = spawn(FakeClock::epoch(), cancel.clone());
        let id = EventId::new(Uuid::new_v4(), 0);
        handle.put(event(id.request_id(), id.seq(), 0, false)).await;

        assert!(handle.can_publish(id).await);
        handle.published(id).await;
        assert!(!handle.can_publish(id).await);
        cancel.cancel();
    }

    #[tokio::test]
    async fn published_on_unknown_id_returns_false() {
        let cancel = CancellationToken::new();
        let handle = spawn(FakeClock::epoch(), cancel.clone());
        assert!(!handle.published(EventId::new(Uuid::new_v4(), 0)).await);
        cancel.cancel();
    }
}
