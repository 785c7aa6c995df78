//! Configuration validation.
//!
//! Resolves every section into a [`StrategyConfig`] (missing keys take their
//! defaults) and rejects values no strategy loop could run with. The asset
//! list is the only required key.

use std::collections::HashSet;
use std::time::Duration;

use crate::domain::error::TraderError;
use crate::domain::strategy::{
    EngineSettings, IndicatorSettings, OrderSettings, RiskSettings, SignalSettings,
    StrategyConfig,
};
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_TIMEFRAME: Timeframe = Timeframe::M5;
pub const DEFAULT_LOT: f64 = 1.0;

/// One `[asset.<SYMBOL>]` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetSpec {
    pub asset: String,
    pub timeframe: Timeframe,
    pub lot: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssetListError {
    #[error("empty token in asset list")]
    EmptyToken,

    #[error("duplicate asset: {0}")]
    DuplicateAsset(String),
}

/// Splits a comma-separated symbol list, uppercasing each symbol.
pub fn parse_assets(input: &str) -> Result<Vec<String>, AssetListError> {
    let mut assets = Vec::new();
    let mut seen = HashSet::new();

    for token in input.split(',') {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            return Err(AssetListError::EmptyToken);
        }
        let asset = trimmed.to_uppercase();
        if !seen.insert(asset.clone()) {
            return Err(AssetListError::DuplicateAsset(asset));
        }
        assets.push(asset);
    }

    Ok(assets)
}

pub fn build_strategy_config(config: &dyn ConfigPort) -> Result<StrategyConfig, TraderError> {
    let strategy = StrategyConfig {
        engine: engine_settings(config)?,
        indicators: indicator_settings(config)?,
        signal: signal_settings(config)?,
        risk: risk_settings(config)?,
        order: order_settings(config)?,
    };
    Ok(strategy)
}

/// Reads `[assets] symbols` and each symbol's own section.
pub fn asset_specs(config: &dyn ConfigPort) -> Result<Vec<AssetSpec>, TraderError> {
    let symbols = match config.get_string("assets", "symbols") {
        Some(s) if !s.trim().is_empty() => s,
        _ => {
            return Err(TraderError::ConfigMissing {
                section: "assets".to_string(),
                key: "symbols".to_string(),
            });
        }
    };
    let assets = parse_assets(&symbols)
        .map_err(|e| TraderError::config_invalid("assets", "symbols", e.to_string()))?;

    assets
        .into_iter()
        .map(|asset| {
            let section = format!("asset.{asset}");
            let timeframe = match config.get_string(&section, "timeframe") {
                Some(raw) => raw
                    .parse::<Timeframe>()
                    .map_err(|e| TraderError::config_invalid(&section, "timeframe", e.to_string()))?,
                None => DEFAULT_TIMEFRAME,
            };
            let lot = config.get_double(&section, "lot", DEFAULT_LOT);
            if !lot.is_finite() || lot <= 0.0 {
                return Err(TraderError::config_invalid(&section, "lot", "lot must be positive"));
            }
            Ok(AssetSpec {
                asset,
                timeframe,
                lot,
            })
        })
        .collect()
}

fn period(config: &dyn ConfigPort, section: &str, key: &str, default: usize) -> Result<usize, TraderError> {
    let value = config.get_int(section, key, default as i64);
    if value < 1 {
        return Err(TraderError::config_invalid(
            section,
            key,
            format!("{key} must be at least 1"),
        ));
    }
    Ok(value as usize)
}

fn non_negative(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, TraderError> {
    let value = config.get_double(section, key, default);
    if !value.is_finite() || value < 0.0 {
        return Err(TraderError::config_invalid(
            section,
            key,
            format!("{key} must be non-negative"),
        ));
    }
    Ok(value)
}

fn positive(config: &dyn ConfigPort, section: &str, key: &str, default: f64) -> Result<f64, TraderError> {
    let value = non_negative(config, section, key, default)?;
    if value == 0.0 {
        return Err(TraderError::config_invalid(
            section,
            key,
            format!("{key} must be positive"),
        ));
    }
    Ok(value)
}

fn engine_settings(config: &dyn ConfigPort) -> Result<EngineSettings, TraderError> {
    let d = EngineSettings::default();
    let cycle_ms = period(config, "engine", "cycle_interval_ms", d.cycle_interval.as_millis() as usize)?;
    let backoff_ms = period(config, "engine", "backoff_interval_ms", d.backoff_interval.as_millis() as usize)?;
    let bar_count = period(config, "engine", "bar_count", d.bar_count)?;
    let min_bars = period(config, "engine", "min_bars", d.min_bars)?;

    if min_bars > bar_count {
        return Err(TraderError::config_invalid(
            "engine",
            "min_bars",
            format!("min_bars ({min_bars}) exceeds bar_count ({bar_count})"),
        ));
    }

    Ok(EngineSettings {
        cycle_interval: Duration::from_millis(cycle_ms as u64),
        backoff_interval: Duration::from_millis(backoff_ms as u64),
        bar_count,
        min_bars,
    })
}

fn indicator_settings(config: &dyn ConfigPort) -> Result<IndicatorSettings, TraderError> {
    let d = IndicatorSettings::default();
    let s = IndicatorSettings {
        ema_fast: period(config, "indicators", "ema_fast", d.ema_fast)?,
        ema_mid: period(config, "indicators", "ema_mid", d.ema_mid)?,
        ema_slow: period(config, "indicators", "ema_slow", d.ema_slow)?,
        macd_fast: period(config, "indicators", "macd_fast", d.macd_fast)?,
        macd_slow: period(config, "indicators", "macd_slow", d.macd_slow)?,
        macd_signal: period(config, "indicators", "macd_signal", d.macd_signal)?,
        rsi_period: period(config, "indicators", "rsi_period", d.rsi_period)?,
        bb_period: period(config, "indicators", "bb_period", d.bb_period)?,
        bb_deviation: positive(config, "indicators", "bb_deviation", d.bb_deviation)?,
        stoch_period: period(config, "indicators", "stoch_period", d.stoch_period)?,
        stoch_k_smooth: period(config, "indicators", "stoch_k_smooth", d.stoch_k_smooth)?,
        stoch_d_smooth: period(config, "indicators", "stoch_d_smooth", d.stoch_d_smooth)?,
        atr_period: period(config, "indicators", "atr_period", d.atr_period)?,
        momentum_period: period(config, "indicators", "momentum_period", d.momentum_period)?,
    };

    if s.macd_fast >= s.macd_slow {
        return Err(TraderError::config_invalid(
            "indicators",
            "macd_fast",
            "macd_fast must be shorter than macd_slow",
        ));
    }
    if s.bb_period < 2 {
        return Err(TraderError::config_invalid(
            "indicators",
            "bb_period",
            "bb_period must be at least 2",
        ));
    }
    Ok(s)
}

fn signal_settings(config: &dyn ConfigPort) -> Result<SignalSettings, TraderError> {
    let d = SignalSettings::default();
    let s = SignalSettings {
        rsi_overbought: non_negative(config, "signal", "rsi_overbought", d.rsi_overbought)?,
        rsi_oversold: non_negative(config, "signal", "rsi_oversold", d.rsi_oversold)?,
        stoch_overbought: non_negative(config, "signal", "stoch_overbought", d.stoch_overbought)?,
        stoch_oversold: non_negative(config, "signal", "stoch_oversold", d.stoch_oversold)?,
        volume_threshold: positive(config, "signal", "volume_threshold", d.volume_threshold)?,
        volume_window: period(config, "signal", "volume_window", d.volume_window)?,
        min_confirmations: period(config, "signal", "min_confirmations", d.min_confirmations)?,
    };

    if s.rsi_oversold >= s.rsi_overbought || s.rsi_overbought > 100.0 {
        return Err(TraderError::config_invalid(
            "signal",
            "rsi_oversold",
            "rsi thresholds must satisfy oversold < overbought <= 100",
        ));
    }
    if s.stoch_oversold >= s.stoch_overbought || s.stoch_overbought > 100.0 {
        return Err(TraderError::config_invalid(
            "signal",
            "stoch_oversold",
            "stochastic thresholds must satisfy oversold < overbought <= 100",
        ));
    }
    if s.min_confirmations > 5 {
        return Err(TraderError::config_invalid(
            "signal",
            "min_confirmations",
            "min_confirmations cannot exceed the 5 available checks",
        ));
    }
    Ok(s)
}

fn risk_settings(config: &dyn ConfigPort) -> Result<RiskSettings, TraderError> {
    let d = RiskSettings::default();
    let session_start = match config.get_time("risk", "session_start") {
        Some(Ok(t)) => t,
        Some(Err(raw)) => {
            return Err(TraderError::config_invalid(
                "risk",
                "session_start",
                format!("invalid time '{raw}', expected HH:MM"),
            ));
        }
        None => d.session_start,
    };
    let session_end = match config.get_time("risk", "session_end") {
        Some(Ok(t)) => t,
        Some(Err(raw)) => {
            return Err(TraderError::config_invalid(
                "risk",
                "session_end",
                format!("invalid time '{raw}', expected HH:MM"),
            ));
        }
        None => d.session_end,
    };
    if session_start > session_end {
        return Err(TraderError::config_invalid(
            "risk",
            "session_start",
            "session_start must not be after session_end",
        ));
    }

    let risk_per_trade_pct = non_negative(config, "risk", "risk_per_trade_pct", d.risk_per_trade_pct)?;
    if risk_per_trade_pct > 100.0 {
        return Err(TraderError::config_invalid(
            "risk",
            "risk_per_trade_pct",
            "risk_per_trade_pct must be at most 100",
        ));
    }

    Ok(RiskSettings {
        max_positions: period(config, "risk", "max_positions", d.max_positions)?,
        max_daily_loss_pct: positive(config, "risk", "max_daily_loss_pct", d.max_daily_loss_pct)?,
        max_spread_points: positive(config, "risk", "max_spread_points", d.max_spread_points)?,
        session_start,
        session_end,
        min_reward_risk: positive(config, "risk", "min_reward_risk", d.min_reward_risk)?,
        risk_per_trade_pct,
    })
}

fn order_settings(config: &dyn ConfigPort) -> Result<OrderSettings, TraderError> {
    let d = OrderSettings::default();
    let deviation = config.get_int("order", "deviation", d.deviation as i64);
    let deviation = u32::try_from(deviation)
        .map_err(|_| TraderError::config_invalid("order", "deviation", "deviation must be non-negative"))?;
    let magic = config.get_int("order", "magic", d.magic as i64);
    let magic = u64::try_from(magic)
        .map_err(|_| TraderError::config_invalid("order", "magic", "magic must be non-negative"))?;
    let comment = config
        .get_string("order", "comment")
        .map(|c| c.trim().to_string())
        .unwrap_or(d.comment);

    Ok(OrderSettings {
        deviation,
        magic,
        comment,
    })
}
