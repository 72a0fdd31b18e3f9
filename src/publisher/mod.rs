//! Publisher: drains the ingest-sink channel into the scheduler, then drains
//! the scheduler into the broker.
//!
//! Each iteration drains any events waiting on the ingest channel into the
//! scheduler first, then asks the scheduler for the next due event, using
//! `try_recv` plus a short idle wait instead of a busy spin so ingress
//! always takes priority over scheduled emission without blocking on either.

mod worker;

pub use worker::spawn;
