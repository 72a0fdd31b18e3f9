//! Trade record: a single executed transaction.

use serde::{Deserialize, Serialize};

/// Which side initiated the trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggressor {
    /// The buyer crossed the spread.
    Bid,
    /// The seller crossed the spread.
    Ask,
}

impl Aggressor {
    /// Signed multiplier applied to quantity when folding into a kline's volume:
    /// asks contribute negatively, bids positively.
    #[must_use]
    pub const fn sign(self) -> i64 {
        match self {
            Self::Bid => 1,
            Self::Ask => -1,
        }
    }
}

/// A single executed trade.
///
/// `price` is transported as a decimal string on the wire and held here as
/// `f64`. `timestamp` is signed 64-bit milliseconds since epoch. Trades within a
/// single input file are ordered non-strictly ascending by `timestamp`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    /// Execution price.
    #[serde(with = "price_as_string")]
    pub price: f64,
    /// Quantity traded.
    pub quantity: u64,
    /// Which side crossed the spread.
    pub aggressor: Aggressor,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl Trade {
    /// `timestamp` promoted to microseconds.
    #[must_use]
    pub const fn timestamp_micros(&self) -> i64 {
        self.timestamp * 1000
    }

    /// `price * quantity`, the contribution to a kline's turnover.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn notional(&self) -> f64 {
        self.price * self.quantity as f64
    }

    /// Signed quantity (see [`Aggressor::sign`]), the contribution to a
    /// kline's volume.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn signed_quantity(&self) -> i64 {
        self.aggressor.sign() * self.quantity as i64
    }
}

mod price_as_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(price: &f64, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_str(&price.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<f64, D::Error> {
        let s = String::deserialize(de)?;
        s.parse::<f64>().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_json() {
        let trade = Trade {
            price: 100.0,
            quantity: 1,
            aggressor: Aggressor::Bid,
            timestamp: 1000,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert_eq!(json, r#"{"price":"100","quantity":1,"aggressor":"bid","timestamp":1000}"#);
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }

    #[test]
    fn ask_contributes_negative_volume() {
        let trade = Trade {
            price: 101.0,
            quantity: 2,
            aggressor: Aggressor::Ask,
            timestamp: 1500,
        };
        assert_eq!(trade.signed_quantity(), -2);
        assert!((trade.notional() - 202.0).abs() < f64::EPSILON);
    }

    #[test]
    fn timestamp_promotes_to_micros() {
        let trade = Trade {
            price: 1.0,
            quantity: 1,
            aggressor: Aggressor::Bid,
            timestamp: 2,
        };
        assert_eq!(trade.timestamp_micros(), 2000);
    }
}
