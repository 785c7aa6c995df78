//! Entry risk gate.
//!
//! Each check yields `Err(GateRejection)` when it blocks the entry. A
//! rejection is an expected outcome, not an error: it holds back the current
//! cycle only. Terminal failures while reading risk state surface as
//! [`TraderError`] instead.

use chrono::NaiveTime;
use std::fmt;

use crate::domain::error::TraderError;
use crate::domain::strategy::RiskSettings;
use crate::ports::clock_port::Clock;
use crate::ports::terminal_port::{AccountInfo, SymbolInfo, TerminalPort, Tick, TradeMode};

#[derive(Debug, Clone, PartialEq)]
pub enum GateRejection {
    OutsideSession {
        now: NaiveTime,
        start: NaiveTime,
        end: NaiveTime,
    },
    MaxPositions {
        open: usize,
        max: usize,
    },
    Drawdown {
        drawdown_pct: f64,
        max_pct: f64,
    },
    NoBalance {
        balance: f64,
    },
    Market(MarketRejection),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketRejection {
    UnknownSymbol,
    NotVisible,
    NotTradable(TradeMode),
    NoQuote,
    MarketClosed,
    SpreadTooWide { spread_points: f64, max_points: f64 },
}

pub type GateResult = Result<(), GateRejection>;

impl fmt::Display for GateRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateRejection::OutsideSession { now, start, end } => write!(
                f,
                "outside trading session ({} not in {}-{})",
                now.format("%H:%M"),
                start.format("%H:%M"),
                end.format("%H:%M")
            ),
            GateRejection::MaxPositions { open, max } => {
                write!(f, "maximum positions reached ({open}/{max})")
            }
            GateRejection::Drawdown {
                drawdown_pct,
                max_pct,
            } => write!(
                f,
                "maximum daily drawdown reached: {drawdown_pct:.2}% (limit {max_pct:.2}%)"
            ),
            GateRejection::NoBalance { balance } => {
                write!(f, "account balance {balance:.2} does not allow a drawdown check")
            }
            GateRejection::Market(reason) => write!(f, "{reason}"),
        }
    }
}

impl fmt::Display for MarketRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketRejection::UnknownSymbol => write!(f, "symbol not found"),
            MarketRejection::NotVisible => write!(f, "symbol is not visible"),
            MarketRejection::NotTradable(mode) => {
                write!(f, "symbol is not open for trading ({mode:?})")
            }
            MarketRejection::NoQuote => write!(f, "no quote available"),
            MarketRejection::MarketClosed => write!(f, "market closed"),
            MarketRejection::SpreadTooWide {
                spread_points,
                max_points,
            } => write!(
                f,
                "spread too wide ({spread_points:.1} points, max {max_points:.1})"
            ),
        }
    }
}

/// Inclusive `[start, end]` time-of-day window.
pub fn check_session(now: NaiveTime, settings: &RiskSettings) -> GateResult {
    if now >= settings.session_start && now <= settings.session_end {
        Ok(())
    } else {
        Err(GateRejection::OutsideSession {
            now,
            start: settings.session_start,
            end: settings.session_end,
        })
    }
}

pub fn check_positions(open: usize, settings: &RiskSettings) -> GateResult {
    if open >= settings.max_positions {
        return Err(GateRejection::MaxPositions {
            open,
            max: settings.max_positions,
        });
    }
    Ok(())
}

/// `(balance - equity) / balance × 100`; `None` for a non-positive balance.
pub fn drawdown_pct(account: &AccountInfo) -> Option<f64> {
    if account.balance <= 0.0 || !account.balance.is_finite() {
        return None;
    }
    Some((account.balance - account.equity) / account.balance * 100.0)
}

pub fn check_drawdown(account: &AccountInfo, settings: &RiskSettings) -> GateResult {
    let drawdown = drawdown_pct(account).ok_or(GateRejection::NoBalance {
        balance: account.balance,
    })?;
    if drawdown > settings.max_daily_loss_pct {
        return Err(GateRejection::Drawdown {
            drawdown_pct: drawdown,
            max_pct: settings.max_daily_loss_pct,
        });
    }
    Ok(())
}

/// Symbol must be known, visible, fully tradable, quoted with non-zero
/// bid/ask, and within the spread limit.
pub fn check_market(
    info: Option<&SymbolInfo>,
    tick: Option<&Tick>,
    max_spread_points: f64,
) -> Result<(), MarketRejection> {
    let info = info.ok_or(MarketRejection::UnknownSymbol)?;
    if !info.visible {
        return Err(MarketRejection::NotVisible);
    }
    if info.trade_mode != TradeMode::Full {
        return Err(MarketRejection::NotTradable(info.trade_mode));
    }
    let tick = tick.ok_or(MarketRejection::NoQuote)?;
    if tick.bid == 0.0 || tick.ask == 0.0 {
        return Err(MarketRejection::MarketClosed);
    }
    if info.point <= 0.0 {
        return Err(MarketRejection::NotTradable(info.trade_mode));
    }
    let spread_points = (tick.ask - tick.bid) / info.point;
    if spread_points > max_spread_points {
        return Err(MarketRejection::SpreadTooWide {
            spread_points,
            max_points: max_spread_points,
        });
    }
    Ok(())
}

/// Symbol data read for a market check, kept for sizing the order.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketQuote {
    pub info: SymbolInfo,
    pub tick: Tick,
}

/// Reads symbol info and tick from the terminal and runs [`check_market`].
pub fn fetch_market(
    terminal: &dyn TerminalPort,
    asset: &str,
    max_spread_points: f64,
) -> Result<Result<MarketQuote, MarketRejection>, TraderError> {
    let info = terminal.symbol_info(asset)?;
    let tick = match info {
        Some(_) => terminal.tick(asset)?,
        None => None,
    };
    if let Err(rejection) = check_market(info.as_ref(), tick.as_ref(), max_spread_points) {
        return Ok(Err(rejection));
    }
    match (info, tick) {
        (Some(info), Some(tick)) => Ok(Ok(MarketQuote { info, tick })),
        _ => Ok(Err(MarketRejection::NoQuote)),
    }
}

/// Session, position and drawdown checks, read fresh from the terminal on
/// every call.
pub struct RiskGate<'a> {
    terminal: &'a dyn TerminalPort,
    clock: &'a dyn Clock,
    settings: &'a RiskSettings,
}

impl<'a> RiskGate<'a> {
    pub fn new(terminal: &'a dyn TerminalPort, clock: &'a dyn Clock, settings: &'a RiskSettings) -> Self {
        Self {
            terminal,
            clock,
            settings,
        }
    }

    pub fn check_entry(&self) -> Result<GateResult, TraderError> {
        if let Err(rejection) = check_session(self.clock.now_time(), self.settings) {
            return Ok(Err(rejection));
        }
        let open = self.terminal.open_position_count()?;
        if let Err(rejection) = check_positions(open, self.settings) {
            return Ok(Err(rejection));
        }
        let account = self.terminal.account_info()?;
        Ok(check_drawdown(&account, self.settings))
    }
}
