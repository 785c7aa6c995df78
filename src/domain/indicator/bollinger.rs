//! Bollinger Bands.
//!
//! Bollinger Bands consist of:
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is the sample standard deviation (divides by N-1).
//! Warmup: first (period-1) values are NaN.

use crate::domain::indicator::{check_len, check_period, rolling_mean, IndicatorError};

#[derive(Debug, Clone, PartialEq)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

pub fn bollinger(
    data: &[f64],
    period: usize,
    multiplier: f64,
) -> Result<BollingerBands, IndicatorError> {
    check_period("BOLLINGER", period, 2)?;
    check_len("BOLLINGER", data.len(), period)?;

    let middle = rolling_mean(data, period);
    let mut upper = Vec::with_capacity(data.len());
    let mut lower = Vec::with_capacity(data.len());

    for (i, &mean) in middle.iter().enumerate() {
        if mean.is_nan() {
            upper.push(f64::NAN);
            lower.push(f64::NAN);
            continue;
        }
        let window = &data[i + 1 - period..=i];
        let variance = window
            .iter()
            .map(|x| {
                let diff = x - mean;
                diff * diff
            })
            .sum::<f64>()
            / (period - 1) as f64;
        let stddev = variance.sqrt();
        upper.push(mean + multiplier * stddev);
        lower.push(mean - multiplier * stddev);
    }

    Ok(BollingerBands {
        upper,
        middle,
        lower,
    })
}
