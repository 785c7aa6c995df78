//! Average True Range.
//!
//! TR[0] = high - low; TR[i] = max(high - low, |high - prev_close|, |low - prev_close|)
//! ATR = simple rolling mean of TR over n bars. Warmup: first (n-1) values are NaN.

use crate::domain::indicator::{check_len, check_period, rolling_mean, IndicatorError};

pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    if high.len() != low.len() || low.len() != close.len() {
        return Err(IndicatorError::LengthMismatch { indicator: "ATR" });
    }
    check_period("ATR", period, 1)?;
    check_len("ATR", close.len(), period)?;

    let tr: Vec<f64> = (0..close.len())
        .map(|i| match i {
            0 => high[0] - low[0],
            _ => true_range(high[i], low[i], close[i - 1]),
        })
        .collect();

    Ok(rolling_mean(&tr, period))
}

/// max(high - low, |high - prev_close|, |low - prev_close|)
pub fn true_range(high: f64, low: f64, prev_close: f64) -> f64 {
    (high - low)
        .max((high - prev_close).abs())
        .max((low - prev_close).abs())
}
