//! Price bar representation.

use chrono::NaiveDateTime;

use crate::domain::error::TraderError;

#[derive(Debug, Clone, PartialEq)]
pub struct PriceBar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub tick_volume: u64,
}

impl PriceBar {
    fn prices(&self) -> [f64; 4] {
        [self.open, self.high, self.low, self.close]
    }
}

/// Checks that a fetched sequence is usable for indicator math: long enough,
/// strictly oldest-first, and free of non-finite or negative prices.
pub fn validate_bars(asset: &str, bars: &[PriceBar], minimum: usize) -> Result<(), TraderError> {
    if bars.is_empty() {
        return Err(TraderError::NoData {
            asset: asset.to_string(),
        });
    }
    if bars.len() < minimum {
        return Err(TraderError::InsufficientData {
            asset: asset.to_string(),
            bars: bars.len(),
            minimum,
        });
    }

    for (index, bar) in bars.iter().enumerate() {
        if bar.prices().iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(TraderError::InvalidBar {
                asset: asset.to_string(),
                index,
                reason: "non-finite or negative price".into(),
            });
        }
        if index > 0 && bar.timestamp <= bars[index - 1].timestamp {
            return Err(TraderError::InvalidBar {
                asset: asset.to_string(),
                index,
                reason: "timestamps are not strictly increasing".into(),
            });
        }
    }

    Ok(())
}
