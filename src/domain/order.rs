//! Order sizing and dispatch.
//!
//! Stop and target distances scale with trend strength:
//! - sl_multiplier = clamp(1 + 0.1·s, 1.0, 1.5)
//! - tp_multiplier = clamp(1.2 + 0.2·s, 1.2, 2.0)
//! - sl_distance = ATR × sl_multiplier
//! - tp_distance = ATR × min_reward_risk × tp_multiplier
//!
//! Distances are converted to prices by multiplying with the symbol's point
//! size and offsetting from the ask (buy) or bid (sell).

use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::risk::fetch_market;
use crate::domain::strategy::{OrderSettings, RiskSettings};
use crate::ports::terminal_port::{OrderStatus, SymbolInfo, TerminalPort, Tick};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderPlan {
    pub side: OrderSide,
    pub strength: u8,
    pub sl_multiplier: f64,
    pub tp_multiplier: f64,
    pub sl_distance: f64,
    pub tp_distance: f64,
}

/// Built once per dispatch and submitted exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub asset: String,
    pub volume: f64,
    pub side: OrderSide,
    pub price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub deviation: u32,
    pub magic: u64,
    pub tag: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub ticket: u64,
    pub request: OrderRequest,
}

pub fn sl_multiplier(strength: u8) -> f64 {
    (1.0 + 0.1 * strength as f64).clamp(1.0, 1.5)
}

pub fn tp_multiplier(strength: u8) -> f64 {
    (1.2 + 0.2 * strength as f64).clamp(1.2, 2.0)
}

pub fn plan_order(
    side: OrderSide,
    atr: f64,
    strength: u8,
    min_reward_risk: f64,
) -> Result<OrderPlan, TraderError> {
    if !atr.is_finite() || atr <= 0.0 {
        return Err(TraderError::InvalidIndicator {
            reason: format!("ATR {atr} cannot size an order"),
        });
    }
    let sl_mult = sl_multiplier(strength);
    let tp_mult = tp_multiplier(strength);
    Ok(OrderPlan {
        side,
        strength,
        sl_multiplier: sl_mult,
        tp_multiplier: tp_mult,
        sl_distance: atr * sl_mult,
        tp_distance: atr * min_reward_risk * tp_mult,
    })
}

pub fn build_request(
    asset: &str,
    plan: &OrderPlan,
    tick: &Tick,
    point: f64,
    volume: f64,
    settings: &OrderSettings,
) -> OrderRequest {
    let (price, stop_loss, take_profit) = match plan.side {
        OrderSide::Buy => (
            tick.ask,
            tick.ask - plan.sl_distance * point,
            tick.ask + plan.tp_distance * point,
        ),
        OrderSide::Sell => (
            tick.bid,
            tick.bid + plan.sl_distance * point,
            tick.bid - plan.tp_distance * point,
        ),
    };

    OrderRequest {
        asset: asset.to_string(),
        volume,
        side: plan.side,
        price,
        stop_loss,
        take_profit,
        deviation: settings.deviation,
        magic: settings.magic,
        tag: settings.comment.clone(),
    }
}

/// Volume risking `risk_pct` of equity, rounded to two decimals and clamped
/// to the symbol's volume limits. Zero when the tick value is unknown.
pub fn risk_based_volume(equity: f64, risk_pct: f64, info: &SymbolInfo) -> f64 {
    if info.tick_value == 0.0 {
        return 0.0;
    }
    let at_risk = equity * (risk_pct / 100.0);
    let volume = (at_risk / info.tick_value * 100.0).round() / 100.0;
    volume.min(info.volume_max).max(info.volume_min)
}

/// Re-checks the market, builds one request and submits it once.
pub fn dispatch(
    terminal: &dyn TerminalPort,
    asset: &str,
    plan: &OrderPlan,
    lot: f64,
    risk: &RiskSettings,
    settings: &OrderSettings,
) -> Result<Fill, TraderError> {
    let quote = fetch_market(terminal, asset, risk.max_spread_points)?.map_err(|rejection| {
        TraderError::MarketUnavailable {
            asset: asset.to_string(),
            reason: rejection.to_string(),
        }
    })?;

    let volume = if risk.risk_per_trade_pct > 0.0 {
        let account = terminal.account_info()?;
        match risk_based_volume(account.equity, risk.risk_per_trade_pct, &quote.info) {
            v if v > 0.0 => v,
            _ => lot,
        }
    } else {
        lot
    };

    let request = build_request(asset, plan, &quote.tick, quote.info.point, volume, settings);
    let response = terminal.submit_order(&request)?;

    match response.status {
        OrderStatus::Done => Ok(Fill {
            ticket: response.ticket,
            request,
        }),
        OrderStatus::Rejected { code, comment } => {
            Err(TraderError::DispatchRejected { code, comment })
        }
    }
}
