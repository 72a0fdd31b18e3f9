//! Kline (OHLCV candle) record and the running aggregator that builds one
//! from a trade stream.

use serde::{Deserialize, Serialize};

use super::trade::Trade;

/// Open-high-low-close-volume aggregation of trades over a fixed granularity
/// window.
///
/// `volume` is signed: asks contribute negatively, bids positively (see
/// [`super::trade::Aggressor::sign`]). `turnover` is Σ price·quantity over the
/// bucket, always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    /// Bucket start, milliseconds since epoch.
    pub timestamp: i64,
    /// Price of the first trade in the bucket.
    pub open: f64,
    /// Highest price seen in the bucket so far.
    pub high: f64,
    /// Lowest price seen in the bucket so far.
    pub low: f64,
    /// Price of the most recent trade in the bucket.
    pub close: f64,
    /// Signed running volume.
    pub volume: i64,
    /// Running turnover (Σ price·quantity).
    pub turnover: f64,
    /// Bucket width, seconds.
    pub granularity: u16,
}

/// Folds a trade stream into a running sequence of [`Kline`] snapshots.
///
/// A bucket is opened by the first trade it sees, or by a trade whose
/// `timestamp ≥ bucket_start + granularity·1000`; that trade starts a new
/// bucket at its own timestamp. Every other in-bucket trade updates
/// high/low/close/volume/turnover; `open` stays fixed at the bucket's first
/// trade.
#[derive(Debug, Clone)]
pub struct KlineBuilder {
    granularity: u16,
    current: Option<Kline>,
}

impl KlineBuilder {
    /// Create a builder for buckets of the given width, in seconds.
    #[must_use]
    pub const fn new(granularity: u16) -> Self {
        Self {
            granularity,
            current: None,
        }
    }

    /// Fold one trade in and return the resulting kline snapshot.
    pub fn fold(&mut self, trade: &Trade) -> Kline {
        let bucket_width_ms = i64::from(self.granularity) * 1000;
        let opens_new_bucket = match &self.current {
            None => true,
            Some(k) => trade.timestamp >= k.timestamp + bucket_width_ms,
        };

        if opens_new_bucket {
            self.current = Some(Kline {
                timestamp: trade.timestamp,
                open: trade.price,
                high: trade.price,
                low: trade.price,
                close: trade.price,
                volume: trade.signed_quantity(),
                turnover: trade.notional(),
                granularity: self.granularity,
            });
        } else if let Some(k) = &mut self.current {
            k.high = k.high.max(trade.price);
            k.low = k.low.min(trade.price);
            k.close = trade.price;
            k.volume += trade.signed_quantity();
            k.turnover += trade.notional();
        }

        self.current.expect("just populated above")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::trade::Aggressor;

    fn trade(price: f64, quantity: u64, aggressor: Aggressor, timestamp: i64) -> Trade {
        Trade {
            price,
            quantity,
            aggressor,
            timestamp,
        }
    }

    #[test]
    fn scenario_b_kline_aggregation() {
        let mut builder = KlineBuilder::new(1);

        let k0 = builder.fold(&trade(100.0, 1, Aggressor::Bid, 1000));
        assert_eq!(k0.timestamp, 1000);
        assert!((k0.open - 100.0).abs() < f64::EPSILON);
        assert!((k0.high - 100.0).abs() < f64::EPSILON);
        assert!((k0.low - 100.0).abs() < f64::EPSILON);
        assert!((k0.close - 100.0).abs() < f64::EPSILON);
        assert_eq!(k0.volume, 1);
        assert!((k0.turnover - 100.0).abs() < f64::EPSILON);

        let k1 = builder.fold(&trade(101.0, 2, Aggressor::Ask, 1500));
        assert_eq!(k1.timestamp, 1000);
        assert!((k1.high - 101.0).abs() < f64::EPSILON);
        assert!((k1.low - 100.0).abs() < f64::EPSILON);
        assert!((k1.close - 101.0).abs() < f64::EPSILON);
        assert_eq!(k1.volume, -1);
        assert!((k1.turnover - 302.0).abs() < f64::EPSILON);

        let k2 = builder.fold(&trade(102.0, 3, Aggressor::Bid, 2000));
        assert_eq!(k2.timestamp, 2000);
        assert!((k2.open - 102.0).abs() < f64::EPSILON);
        assert_eq!(k2.volume, 3);
        assert!((k2.turnover - 306.0).abs() < f64::EPSILON);
    }

    #[test]
    fn round_trips_through_json() {
        let kline = Kline {
            timestamp: 1000,
            open: 100.0,
            high: 101.0,
            low: 99.0,
            close: 100.5,
            volume: 3,
            turnover: 450.0,
            granularity: 60,
        };
        let json = serde_json::to_string(&kline).unwrap();
        let back: Kline = serde_json::from_str(&json).unwrap();
        assert_eq!(kline, back);
    }
}
