//! Immutable strategy configuration.
//!
//! A [`StrategyConfig`] is built once (from defaults or an INI file) and
//! shared read-only by every strategy loop. Nothing mutates it at runtime.

use chrono::NaiveTime;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub cycle_interval: Duration,
    pub backoff_interval: Duration,
    pub bar_count: usize,
    pub min_bars: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub ema_fast: usize,
    pub ema_mid: usize,
    pub ema_slow: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub rsi_period: usize,
    pub bb_period: usize,
    pub bb_deviation: f64,
    pub stoch_period: usize,
    pub stoch_k_smooth: usize,
    pub stoch_d_smooth: usize,
    pub atr_period: usize,
    pub momentum_period: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalSettings {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub stoch_overbought: f64,
    pub stoch_oversold: f64,
    pub volume_threshold: f64,
    pub volume_window: usize,
    pub min_confirmations: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RiskSettings {
    pub max_positions: usize,
    pub max_daily_loss_pct: f64,
    pub max_spread_points: f64,
    pub session_start: NaiveTime,
    pub session_end: NaiveTime,
    pub min_reward_risk: f64,
    /// Percent of equity risked per trade; 0 keeps the configured lot.
    pub risk_per_trade_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderSettings {
    pub deviation: u32,
    pub magic: u64,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyConfig {
    pub engine: EngineSettings,
    pub indicators: IndicatorSettings,
    pub signal: SignalSettings,
    pub risk: RiskSettings,
    pub order: OrderSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            cycle_interval: Duration::from_secs(5),
            backoff_interval: Duration::from_secs(10),
            bar_count: 200,
            min_bars: 100,
        }
    }
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        Self {
            ema_fast: 9,
            ema_mid: 21,
            ema_slow: 50,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            rsi_period: 14,
            bb_period: 20,
            bb_deviation: 1.8,
            stoch_period: 10,
            stoch_k_smooth: 3,
            stoch_d_smooth: 3,
            atr_period: 10,
            momentum_period: 10,
        }
    }
}

impl Default for SignalSettings {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            stoch_overbought: 80.0,
            stoch_oversold: 20.0,
            volume_threshold: 1.2,
            volume_window: 20,
            min_confirmations: 2,
        }
    }
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            max_positions: 3,
            max_daily_loss_pct: 3.0,
            max_spread_points: 50.0,
            session_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            session_end: NaiveTime::from_hms_opt(17, 30, 0).unwrap_or(NaiveTime::MIN),
            min_reward_risk: 1.2,
            risk_per_trade_pct: 0.0,
        }
    }
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self {
            deviation: 10,
            magic: 123_456,
            comment: "multitrader".to_string(),
        }
    }
}
