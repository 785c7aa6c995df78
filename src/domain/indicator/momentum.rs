//! Momentum: x[i] - x[i-n].
//!
//! The first n outputs are backfilled with the value at index n, so the
//! series has no undefined head.

use crate::domain::indicator::{check_len, check_period, IndicatorError};

pub fn momentum(data: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    check_period("MOMENTUM", period, 1)?;
    check_len("MOMENTUM", data.len(), period + 1)?;

    let mut values = vec![0.0; data.len()];
    for i in period..data.len() {
        values[i] = data[i] - data[i - period];
    }
    let boundary = values[period];
    values[..period].fill(boundary);

    Ok(values)
}
