//! Validated primitive types for the replay domain.
//!
//! These newtypes provide:
//! - Type safety (can't accidentally pass a sequence number as a request id)
//! - Validation at construction time
//! - Domain semantics in function signatures

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT ID
// ═══════════════════════════════════════════════════════════════════════════════

/// Stable identifier of a scheduler event: `"{request_id}:{seq}"`.
///
/// This same string is the cache key and the in-scheduler map key. At most one
/// event with a given identity exists at any moment.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EventId {
    request_id: Uuid,
    seq: u64,
}

impl EventId {
    /// Build an event id from its parts (infallible).
    #[must_use]
    pub const fn new(request_id: Uuid, seq: u64) -> Self {
        Self { request_id, seq }
    }

    /// The owning subscription's id.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The 0-based sequence number within the subscription.
    #[must_use]
    pub const fn seq(&self) -> u64 {
        self.seq
    }

    /// Render as the canonical `"{request_id}:{seq}"` string.
    #[must_use]
    pub fn to_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({self})")
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.request_id, self.seq)
    }
}

impl From<EventId> for String {
    fn from(id: EventId) -> Self {
        id.to_string()
    }
}

impl TryFrom<String> for EventId {
    type Error = InvalidEventId;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::from_str(&s)
    }
}

impl FromStr for EventId {
    type Err = InvalidEventId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (request_id, seq) = s
            .rsplit_once(':')
            .ok_or_else(|| InvalidEventId::Malformed(s.to_string()))?;
        let request_id =
            Uuid::parse_str(request_id).map_err(|_| InvalidEventId::Malformed(s.to_string()))?;
        let seq = seq
            .parse::<u64>()
            .map_err(|_| InvalidEventId::Malformed(s.to_string()))?;
        Ok(Self { request_id, seq })
    }
}

/// Error for malformed event ids.
#[derive(Debug, Clone, Error)]
pub enum InvalidEventId {
    /// The string was not of the form `"{uuid}:{seq}"`.
    #[error("malformed event id: {0:?}")]
    Malformed(String),
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
