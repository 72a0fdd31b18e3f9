//! The scheduler's unit of work, and the tagged envelope stored in the cache.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::kline::Kline;
use super::primitives::EventId;
use super::trade::Trade;

/// A deadline-tagged reference to one cached payload (or an EOF marker).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    /// The owning subscription.
    pub request_id: Uuid,
    /// Monotonic 0-based sequence within the subscription.
    pub seq: u64,
    /// Wall-clock microseconds at which this event becomes eligible for
    /// emission.
    pub deadline: i64,
    /// Whether this is the terminal end-of-stream marker.
    pub eof: bool,
}

impl Event {
    /// This event's stable identity, `"{request_id}:{seq}"`.
    #[must_use]
    pub const fn id(&self) -> EventId {
        EventId::new(self.request_id, self.seq)
    }
}

/// Value stored in the event cache: a tagged variant rather than relying on
/// substring-sniffing the encoded payload for a `"granularity"` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CachedPayload {
    /// A single trade.
    Order {
        /// The trade payload.
        payload: Trade,
    },
    /// A kline snapshot as of some trade.
    Kline {
        /// The kline payload.
        payload: Kline,
    },
}

impl CachedPayload {
    /// Encode to the bytes stored under this event's cache key.
    ///
    /// # Errors
    /// Returns an error if serialization fails (infallible in practice for
    /// these types, but `serde_json::Error` is the honest return type).
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from cached bytes.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a valid encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::trade::Aggressor;

    #[test]
    fn event_id_matches_parts() {
        let event = Event {
            request_id: Uuid::nil(),
            seq: 7,
            deadline: 100,
            eof: false,
        };
        assert_eq!(event.id().to_string(), format!("{}:7", Uuid::nil()));
    }

    #[test]
    fn cached_payload_round_trips() {
        let trade = Trade {
            price: 1.0,
            quantity: 1,
            aggressor: Aggressor::Bid,
            timestamp: 1,
        };
        let payload = CachedPayload::Order { payload: trade };
        let bytes = payload.encode().unwrap();
        assert_eq!(CachedPayload::decode(&bytes).unwrap(), payload);
    }
}
