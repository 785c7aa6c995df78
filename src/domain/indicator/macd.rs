//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(fast) - EMA(slow)
//! Signal Line = EMA(signal) of MACD Line
//!
//! Default parameters: fast=12, slow=26, signal=9

use crate::domain::indicator::{check_len, check_period, ema, IndicatorError};

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

#[derive(Debug, Clone, PartialEq)]
pub struct Macd {
    pub line: Vec<f64>,
    pub signal: Vec<f64>,
}

pub fn macd(
    data: &[f64],
    fast: usize,
    slow: usize,
    signal_period: usize,
) -> Result<Macd, IndicatorError> {
    check_period("MACD", fast, 1)?;
    check_period("MACD", slow, 1)?;
    check_period("MACD", signal_period, 1)?;
    check_len("MACD", data.len(), fast.max(slow).max(signal_period))?;

    let ema_fast = ema(data, fast)?;
    let ema_slow = ema(data, slow)?;
    let line: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    let signal = ema(&line, signal_period)?;

    Ok(Macd { line, signal })
}
