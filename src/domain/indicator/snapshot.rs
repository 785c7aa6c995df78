//! Full indicator set for one bar sequence.

use crate::domain::bar::PriceBar;
use crate::domain::indicator::{
    atr, bollinger, ema, macd, momentum, rsi, stochastic, IndicatorError,
};
use crate::domain::strategy::IndicatorSettings;

/// Every series the signal evaluator reads, recomputed from scratch each cycle.
#[derive(Debug, Clone)]
pub struct IndicatorSnapshot {
    pub close: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub tick_volume: Vec<f64>,
    pub ema_fast: Vec<f64>,
    pub ema_mid: Vec<f64>,
    pub ema_slow: Vec<f64>,
    pub macd_line: Vec<f64>,
    pub signal_line: Vec<f64>,
    pub rsi: Vec<f64>,
    pub bb_upper: Vec<f64>,
    pub bb_mid: Vec<f64>,
    pub bb_lower: Vec<f64>,
    pub stoch_k: Vec<f64>,
    pub stoch_d: Vec<f64>,
    pub atr: Vec<f64>,
    pub momentum: Vec<f64>,
}

impl IndicatorSnapshot {
    pub fn compute(bars: &[PriceBar], settings: &IndicatorSettings) -> Result<Self, IndicatorError> {
        let close: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let high: Vec<f64> = bars.iter().map(|b| b.high).collect();
        let low: Vec<f64> = bars.iter().map(|b| b.low).collect();
        let tick_volume: Vec<f64> = bars.iter().map(|b| b.tick_volume as f64).collect();

        let macd = macd(
            &close,
            settings.macd_fast,
            settings.macd_slow,
            settings.macd_signal,
        )?;
        let bands = bollinger(&close, settings.bb_period, settings.bb_deviation)?;
        let stoch = stochastic(
            &high,
            &low,
            &close,
            settings.stoch_period,
            settings.stoch_k_smooth,
            settings.stoch_d_smooth,
        )?;

        Ok(Self {
            ema_fast: ema(&close, settings.ema_fast)?,
            ema_mid: ema(&close, settings.ema_mid)?,
            ema_slow: ema(&close, settings.ema_slow)?,
            macd_line: macd.line,
            signal_line: macd.signal,
            rsi: rsi(&close, settings.rsi_period)?,
            bb_upper: bands.upper,
            bb_mid: bands.middle,
            bb_lower: bands.lower,
            stoch_k: stoch.k,
            stoch_d: stoch.d,
            atr: atr(&high, &low, &close, settings.atr_period)?,
            momentum: momentum(&close, settings.momentum_period)?,
            close,
            high,
            low,
            tick_volume,
        })
    }

    pub fn latest_atr(&self) -> f64 {
        back(&self.atr, 0)
    }
}

/// Value `offset` positions before the newest one; `NaN` when out of range.
pub fn back(series: &[f64], offset: usize) -> f64 {
    series
        .len()
        .checked_sub(offset + 1)
        .and_then(|i| series.get(i))
        .copied()
        .unwrap_or(f64::NAN)
}
