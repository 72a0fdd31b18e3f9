//! Domain types for the replay service.
//!
//! - [`trade`] - the `Trade` record and its canonical JSON codec
//! - [`kline`] - the `Kline` record and the running aggregator that builds one
//! - [`subscription`] - client↔server subscription protocol frames
//! - [`event`] - the scheduler's unit of work and the tagged cache envelope
//! - [`primitives`] - validated newtypes (`EventId`)

pub mod event;
pub mod kline;
pub mod primitives;
pub mod subscription;
pub mod trade;

pub use event::{CachedPayload, Event};
pub use kline::{Kline, KlineBuilder};
pub use primitives::{EventId, InvalidEventId};
pub use subscription::{
    EofFrame, InvalidSubscriptionRequest, SubscriptionName, SubscriptionRequest,
    SubscriptionResponse, SubscriptionType,
};
pub use trade::{Aggressor, Trade};
