//! Subscription request/response wire types and the client→server websocket
//! protocol frame shape.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which payload shape a subscription replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionName {
    /// Raw trades.
    Order,
    /// Aggregated OHLCV candles.
    Kline,
}

/// `type` field of a client→server subscription frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionType {
    /// Open a new replay session.
    Subscribe,
    /// Tear down an existing one.
    Unsubscribe,
}

/// A client→server subscription control frame.
///
/// Defaults are filled in by [`SubscriptionRequest::generate`] before the
/// request reaches the ingest queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionRequest {
    /// Subscription id; generated server-side if missing/empty.
    #[serde(default)]
    pub id: String,
    /// Path to a previously uploaded file, or a well-known default.
    #[serde(default)]
    pub filename: String,
    /// Replay speed divisor; must be `> 0`.
    #[serde(default)]
    pub replay_rate: f32,
    /// Which payload shape to replay.
    pub name: SubscriptionName,
    /// Bucket width in seconds; required and `> 0` iff `name == Kline`.
    #[serde(default)]
    pub granularity: u16,
    /// Whether this frame subscribes or unsubscribes.
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
}

/// Errors surfaced when a [`SubscriptionRequest`] fails validation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum InvalidSubscriptionRequest {
    /// `id` was empty after defaulting.
    #[error("subscription id is empty")]
    EmptyId,
    /// `filename` was empty after defaulting.
    #[error("filename is empty")]
    EmptyFilename,
    /// `replay_rate` was not strictly positive.
    #[error("replay_rate must be > 0, got {0}")]
    NonPositiveReplayRate(f32),
    /// `name == kline` but `granularity` was 0.
    #[error("granularity must be > 0 for kline subscriptions")]
    ZeroGranularity,
    /// The referenced file does not exist on local disk.
    #[error("file not found: {0}")]
    FileNotFound(String),
}

impl SubscriptionRequest {
    /// Default replay rate when the client omits one.
    pub const DEFAULT_REPLAY_RATE: f32 = 60.0;
    /// Default kline bucket width when the client omits one.
    pub const DEFAULT_GRANULARITY: u16 = 60;
    /// Default filename when the client omits one.
    pub const DEFAULT_FILENAME: &'static str = "trades.txt";

    /// Fill in server-side defaults for omitted fields.
    #[must_use]
    pub fn generate(mut self) -> Self {
        if self.id.is_empty() {
            self.id = Uuid::new_v4().to_string();
        }
        if self.filename.is_empty() {
            self.filename = Self::DEFAULT_FILENAME.to_string();
        }
        if self.replay_rate == 0.0 {
            self.replay_rate = Self::DEFAULT_REPLAY_RATE;
        }
        if self.name == SubscriptionName::Kline && self.granularity == 0 {
            self.granularity = Self::DEFAULT_GRANULARITY;
        }
        self
    }

    /// Validate all required invariants, given a file-existence check.
    ///
    /// The disk check is injected so unit tests don't need a real filesystem.
    ///
    /// # Errors
    /// Returns the first validation failure encountered.
    pub fn validate(&self, file_exists: impl FnOnce(&str) -> bool) -> Result<(), InvalidSubscriptionRequest> {
        if self.id.is_empty() {
            return Err(InvalidSubscriptionRequest::EmptyId);
        }
        if self.filename.is_empty() {
            return Err(InvalidSubscriptionRequest::EmptyFilename);
        }
        if self.replay_rate <= 0.0 {
            return Err(InvalidSubscriptionRequest::NonPositiveReplayRate(self.replay_rate));
        }
        if self.name == SubscriptionName::Kline && self.granularity == 0 {
            return Err(InvalidSubscriptionRequest::ZeroGranularity);
        }
        if !file_exists(&self.filename) {
            return Err(InvalidSubscriptionRequest::FileNotFound(self.filename.clone()));
        }
        Ok(())
    }

    /// Parse `id` as a UUID, if it is one.
    #[must_use]
    pub fn uuid(&self) -> Option<Uuid> {
        Uuid::parse_str(&self.id).ok()
    }
}

/// A server→client acknowledgement frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionResponse {
    /// `0` for a rejected request, `1` for a successful one.
    pub code: u32,
    /// The subscription id the response refers to.
    pub id: String,
    /// Human-readable message.
    pub msg: String,
}

impl SubscriptionResponse {
    /// `{code:0, msg:"Bad Payload"}` rejection for an unparsable control frame.
    #[must_use]
    pub fn bad_payload() -> Self {
        Self {
            code: 0,
            id: String::new(),
            msg: "Bad Payload".to_string(),
        }
    }

    /// Acknowledgement sent on successful subscribe.
    #[must_use]
    pub fn subscribed(req: &SubscriptionRequest) -> Self {
        Self {
            code: 1,
            id: req.id.clone(),
            msg: format!(
                "Subscription request for replay: {} (x{})",
                req.filename, req.replay_rate
            ),
        }
    }

    /// Acknowledgement sent on successful unsubscribe.
    #[must_use]
    pub fn unsubscribed(id: &str) -> Self {
        Self {
            code: 1,
            id: id.to_string(),
            msg: "Unsubscribed".to_string(),
        }
    }
}

/// End-of-stream marker for a subscription's replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EofFrame {
    /// The subscription this EOF terminates.
    pub request_id: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn generate_fills_defaults() {
        let req = SubscriptionRequest {
            id: String::new(),
            filename: String::new(),
            replay_rate: 0.0,
            name: SubscriptionName::Kline,
            granularity: 0,
            kind: SubscriptionType::Subscribe,
        }
        .generate();

        assert!(!req.id.is_empty());
        assert_eq!(req.filename, "trades.txt");
        assert!((req.replay_rate - 60.0).abs() < f32::EPSILON);
        assert_eq!(req.granularity, 60);
    }

    #[test]
    fn order_subscription_does_not_require_granularity() {
        let req = SubscriptionRequest {
            id: "x".into(),
            filename: "f.txt".into(),
            replay_rate: 1.0,
            name: SubscriptionName::Order,
            granularity: 0,
            kind: SubscriptionType::Subscribe,
        };
        assert!(req.validate(|_| true).is_ok());
    }

    #[test]
    fn kline_subscription_requires_granularity() {
        let req = SubscriptionRequest {
            id: "x".into(),
            filename: "f.txt".into(),
            replay_rate: 1.0,
            name: SubscriptionName::Kline,
            granularity: 0,
            kind: SubscriptionType::Subscribe,
        };
        assert!(matches!(
            req.validate(|_| true),
            Err(InvalidSubscriptionRequest::ZeroGranularity)
        ));
    }

    #[test]
    fn validate_rejects_missing_file() {
        let req = SubscriptionRequest {
            id: "x".into(),
            filename: "f.txt".into(),
            replay_rate: 1.0,
            name: SubscriptionName::Order,
            granularity: 0,
            kind: SubscriptionType::Subscribe,
        };
        assert!(matches!(
            req.validate(|_| false),
            Err(InvalidSubscriptionRequest::FileNotFound(_))
        ));
    }

    #[test]
    fn bad_payload_shape() {
        let resp = SubscriptionResponse::bad_payload();
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"code":0,"id":"","msg":"Bad Payload"}"#);
    }
}
