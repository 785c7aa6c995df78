//! RSI (Relative Strength Index).
//!
//! Average gain and loss are simple means of the last n price changes:
//! - gains/losses are the positive/negative parts of x[i] - x[i-1]
//! - an average loss of zero is replaced by 1e-6
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! The output holds one value per price change (`len - 1` values); the first
//! n-1 of them are the neutral 50.

use crate::domain::indicator::{check_len, check_period, IndicatorError};

pub const NEUTRAL: f64 = 50.0;
const LOSS_EPSILON: f64 = 0.000_001;

pub fn rsi(data: &[f64], period: usize) -> Result<Vec<f64>, IndicatorError> {
    check_period("RSI", period, 1)?;
    check_len("RSI", data.len(), period + 1)?;

    let deltas: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    let gains: Vec<f64> = deltas.iter().map(|d| d.max(0.0)).collect();
    let losses: Vec<f64> = deltas.iter().map(|d| (-d).max(0.0)).collect();

    let mut values = vec![NEUTRAL; period - 1];
    values.reserve(deltas.len() + 1 - period);

    for end in period..=deltas.len() {
        let avg_gain = gains[end - period..end].iter().sum::<f64>() / period as f64;
        let avg_loss = losses[end - period..end].iter().sum::<f64>() / period as f64;
        let divisor = if avg_loss == 0.0 { LOSS_EPSILON } else { avg_loss };
        let rs = avg_gain / divisor;
        values.push(100.0 - 100.0 / (1.0 + rs));
    }

    Ok(values)
}
