//! Stochastic Oscillator.
//!
//! raw %K = 100 × (close - lowest low) / (highest high - lowest low) over n bars
//! %K = SMA(raw %K, k_smooth)
//! %D = SMA(%K, d_smooth)
//!
//! A window with no range (highest high == lowest low) yields NaN.

use crate::domain::indicator::{
    check_len, check_period, rolling_max, rolling_mean, rolling_min, IndicatorError,
};

pub const DEFAULT_K_SMOOTH: usize = 3;
pub const DEFAULT_D_SMOOTH: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct Stochastic {
    pub k: Vec<f64>,
    pub d: Vec<f64>,
}

pub fn stochastic(
    high: &[f64],
    low: &[f64],
    close: &[f64],
    period: usize,
    k_smooth: usize,
    d_smooth: usize,
) -> Result<Stochastic, IndicatorError> {
    if high.len() != low.len() || low.len() != close.len() {
        return Err(IndicatorError::LengthMismatch {
            indicator: "STOCHASTIC",
        });
    }
    check_period("STOCHASTIC", period, 1)?;
    check_period("STOCHASTIC", k_smooth, 1)?;
    check_period("STOCHASTIC", d_smooth, 1)?;
    check_len("STOCHASTIC", close.len(), period + k_smooth + d_smooth - 2)?;

    let lowest = rolling_min(low, period);
    let highest = rolling_max(high, period);

    let raw: Vec<f64> = close
        .iter()
        .zip(lowest.iter().zip(&highest))
        .map(|(c, (lo, hi))| {
            let range = hi - lo;
            if range.is_nan() || range == 0.0 {
                f64::NAN
            } else {
                100.0 * (c - lo) / range
            }
        })
        .collect();

    let k = rolling_mean(&raw, k_smooth);
    let d = rolling_mean(&k, d_smooth);

    Ok(Stochastic { k, d })
}
