//! Technical indicator implementations.
//!
//! Every indicator is a pure function over real-valued columns ordered
//! oldest → newest. Outputs are aligned with their input (one value per bar)
//! except RSI, which yields one value per price change. Positions where a
//! rolling window has not filled yet are `NaN`.
//!
//! All functions reject windows the input cannot satisfy with an
//! [`IndicatorError`] instead of returning a partially computed series.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod momentum;
pub mod rsi;
pub mod snapshot;
pub mod stochastic;

pub use atr::atr;
pub use bollinger::{bollinger, BollingerBands};
pub use ema::ema;
pub use macd::{macd, Macd};
pub use momentum::momentum;
pub use rsi::rsi;
pub use snapshot::IndicatorSnapshot;
pub use stochastic::{stochastic, Stochastic};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IndicatorError {
    #[error("{indicator}: invalid period {period}")]
    InvalidPeriod {
        indicator: &'static str,
        period: usize,
    },

    #[error("{indicator}: need at least {required} values, have {len}")]
    InsufficientData {
        indicator: &'static str,
        len: usize,
        required: usize,
    },

    #[error("{indicator}: input columns differ in length")]
    LengthMismatch { indicator: &'static str },
}

pub(crate) fn check_period(
    indicator: &'static str,
    period: usize,
    minimum: usize,
) -> Result<(), IndicatorError> {
    if period < minimum {
        return Err(IndicatorError::InvalidPeriod { indicator, period });
    }
    Ok(())
}

pub(crate) fn check_len(
    indicator: &'static str,
    len: usize,
    required: usize,
) -> Result<(), IndicatorError> {
    if len < required {
        return Err(IndicatorError::InsufficientData {
            indicator,
            len,
            required,
        });
    }
    Ok(())
}

/// Simple moving average; `NaN` until the window fills or while it holds a `NaN`.
pub(crate) fn rolling_mean(data: &[f64], window: usize) -> Vec<f64> {
    rolling(data, window, |w| w.iter().sum::<f64>() / window as f64)
}

pub(crate) fn rolling_min(data: &[f64], window: usize) -> Vec<f64> {
    rolling(data, window, |w| w.iter().copied().fold(f64::INFINITY, f64::min))
}

pub(crate) fn rolling_max(data: &[f64], window: usize) -> Vec<f64> {
    rolling(data, window, |w| {
        w.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

fn rolling<F>(data: &[f64], window: usize, reduce: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    (0..data.len())
        .map(|i| {
            if window == 0 || i + 1 < window {
                return f64::NAN;
            }
            let slice = &data[i + 1 - window..=i];
            if slice.iter().any(|v| v.is_nan()) {
                f64::NAN
            } else {
                reduce(slice)
            }
        })
        .collect()
}
