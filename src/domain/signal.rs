//! Signal evaluation: trend, reversal and confirmation checks over the
//! latest readings of an [`IndicatorSnapshot`].
//!
//! Evaluation is pure. The final decision also needs the risk gate, which
//! depends on terminal state and the clock; [`decide`] joins the two.

use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::indicator::snapshot::{back, IndicatorSnapshot};
use crate::domain::order::OrderSide;
use crate::domain::risk::GateRejection;
use crate::domain::strategy::SignalSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrendAssessment {
    pub direction: TrendDirection,
    /// 0..=5; zero whenever the direction is flat.
    pub strength: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDecision {
    Buy,
    Sell,
    Hold,
}

impl SignalDecision {
    pub fn side(self) -> Option<OrderSide> {
        match self {
            SignalDecision::Buy => Some(OrderSide::Buy),
            SignalDecision::Sell => Some(OrderSide::Sell),
            SignalDecision::Hold => None,
        }
    }
}

impl fmt::Display for SignalDecision {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignalDecision::Buy => write!(f, "Buy"),
            SignalDecision::Sell => write!(f, "Sell"),
            SignalDecision::Hold => write!(f, "Hold"),
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TrendDirection::Up => write!(f, "UP"),
            TrendDirection::Down => write!(f, "DOWN"),
            TrendDirection::Flat => write!(f, "FLAT"),
        }
    }
}

/// Outcome of one evaluation, before the risk gate.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub trend: TrendAssessment,
    pub rsi_buy: bool,
    pub rsi_sell: bool,
    pub macd_buy: bool,
    pub macd_sell: bool,
    pub volume_high: bool,
    pub buy_confirmations: usize,
    pub sell_confirmations: usize,
    pub candidate: SignalDecision,
    pub rsi: f64,
    pub stoch_k: f64,
    pub momentum: f64,
    pub macd_above_signal: bool,
}

/// Fast EMA above mid, close above mid, positive momentum, rising close and a higher low.
pub fn trend_up(snap: &IndicatorSnapshot) -> bool {
    back(&snap.ema_fast, 0) > back(&snap.ema_mid, 0)
        && back(&snap.close, 0) > back(&snap.ema_mid, 0)
        && back(&snap.momentum, 0) > 0.0
        && back(&snap.close, 0) > back(&snap.close, 1)
        && back(&snap.low, 0) > back(&snap.low, 1)
}

/// Mirror of [`trend_up`]; a lower high stands in for the higher low.
pub fn trend_down(snap: &IndicatorSnapshot) -> bool {
    back(&snap.ema_fast, 0) < back(&snap.ema_mid, 0)
        && back(&snap.close, 0) < back(&snap.ema_mid, 0)
        && back(&snap.momentum, 0) < 0.0
        && back(&snap.close, 0) < back(&snap.close, 1)
        && back(&snap.high, 0) < back(&snap.high, 1)
}

/// Current tick volume above `threshold` × mean of the last `window` volumes.
pub fn volume_high(tick_volume: &[f64], window: usize, threshold: f64) -> bool {
    let start = tick_volume.len().saturating_sub(window);
    let recent = &tick_volume[start..];
    if recent.is_empty() {
        return false;
    }
    let mean = recent.iter().sum::<f64>() / recent.len() as f64;
    back(tick_volume, 0) > mean * threshold
}

pub fn assess_trend(snap: &IndicatorSnapshot, volume_high: bool) -> TrendAssessment {
    let (direction, checks) = if trend_up(snap) {
        (
            TrendDirection::Up,
            [
                back(&snap.ema_fast, 0) > back(&snap.ema_fast, 1),
                back(&snap.ema_mid, 0) > back(&snap.ema_mid, 1),
                back(&snap.close, 0) > back(&snap.bb_mid, 0),
                back(&snap.stoch_k, 0) > back(&snap.stoch_k, 1),
                volume_high,
            ],
        )
    } else if trend_down(snap) {
        (
            TrendDirection::Down,
            [
                back(&snap.ema_fast, 0) < back(&snap.ema_fast, 1),
                back(&snap.ema_mid, 0) < back(&snap.ema_mid, 1),
                back(&snap.close, 0) < back(&snap.bb_mid, 0),
                back(&snap.stoch_k, 0) < back(&snap.stoch_k, 1),
                volume_high,
            ],
        )
    } else {
        return TrendAssessment {
            direction: TrendDirection::Flat,
            strength: 0,
        };
    };

    TrendAssessment {
        direction,
        strength: checks.iter().filter(|&&c| c).count() as u8,
    }
}

pub fn evaluate(snap: &IndicatorSnapshot, settings: &SignalSettings) -> Result<Evaluation, TraderError> {
    for (name, series) in [
        ("ema_fast", &snap.ema_fast),
        ("ema_mid", &snap.ema_mid),
        ("ema_slow", &snap.ema_slow),
        ("macd_line", &snap.macd_line),
        ("rsi", &snap.rsi),
    ] {
        if !back(series, 0).is_finite() {
            return Err(TraderError::InvalidIndicator {
                reason: format!("latest {name} is not finite"),
            });
        }
    }

    let close = back(&snap.close, 0);
    let ema_fast = (back(&snap.ema_fast, 0), back(&snap.ema_fast, 1));
    let momentum = back(&snap.momentum, 0);
    let stoch_k = back(&snap.stoch_k, 0);
    let rsi = [back(&snap.rsi, 0), back(&snap.rsi, 1), back(&snap.rsi, 2)];
    let macd = (back(&snap.macd_line, 0), back(&snap.macd_line, 1));
    let signal = back(&snap.signal_line, 0);

    let volume_high = volume_high(
        &snap.tick_volume,
        settings.volume_window,
        settings.volume_threshold,
    );
    let trend = assess_trend(snap, volume_high);

    let rsi_buy = rsi[0] < settings.rsi_oversold && rsi[0] > rsi[1] && rsi[1] > rsi[2];
    let rsi_sell = rsi[0] > settings.rsi_overbought && rsi[0] < rsi[1] && rsi[1] < rsi[2];
    let macd_buy = macd.0 > signal && macd.0 > macd.1;
    let macd_sell = macd.0 < signal && macd.0 < macd.1;

    let buy_confirmations = [
        close < back(&snap.bb_upper, 0),
        stoch_k < settings.stoch_overbought,
        volume_high,
        momentum > 0.0,
        ema_fast.0 > ema_fast.1,
    ]
    .iter()
    .filter(|&&c| c)
    .count();

    let sell_confirmations = [
        close > back(&snap.bb_lower, 0),
        stoch_k > settings.stoch_oversold,
        volume_high,
        momentum < 0.0,
        ema_fast.0 < ema_fast.1,
    ]
    .iter()
    .filter(|&&c| c)
    .count();

    let buy = (trend.direction == TrendDirection::Up || (rsi_buy && macd_buy))
        && buy_confirmations >= settings.min_confirmations;
    let sell = (trend.direction == TrendDirection::Down || (rsi_sell && macd_sell))
        && sell_confirmations >= settings.min_confirmations;

    let candidate = match (buy, sell) {
        (true, false) => SignalDecision::Buy,
        (false, true) => SignalDecision::Sell,
        _ => SignalDecision::Hold,
    };

    Ok(Evaluation {
        trend,
        rsi_buy,
        rsi_sell,
        macd_buy,
        macd_sell,
        volume_high,
        buy_confirmations,
        sell_confirmations,
        candidate,
        rsi: rsi[0],
        stoch_k,
        momentum,
        macd_above_signal: macd.0 > signal,
    })
}

/// Final decision: the candidate survives only if the risk gate passed.
pub fn decide(evaluation: &Evaluation, gate: &Result<(), GateRejection>) -> SignalDecision {
    match (evaluation.candidate, gate) {
        (SignalDecision::Hold, _) | (_, Err(_)) => SignalDecision::Hold,
        (side, Ok(())) => side,
    }
}
