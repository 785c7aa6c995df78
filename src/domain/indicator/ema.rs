//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first value, then EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! No warmup: every output is defined.

use crate::domain::indicator::{check_len, check_period, IndicatorError};

pub fn ema(data: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    check_period("EMA", period, 1)?;
    check_len("EMA", data.len(), period)?;

    let k = 2.0 / (period as f64 + 1.0);
    let mut values = Vec::with_capacity(data.len());
    let mut prev = data[0];
    values.push(prev);

    for &x in &data[1..] {
        prev = x * k + prev * (1.0 - k);
        values.push(prev);
    }

    Ok(values)
}
