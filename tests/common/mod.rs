#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use multitrader::domain::bar::PriceBar;
use multitrader::domain::error::TraderError;
use multitrader::domain::order::OrderRequest;
use multitrader::domain::timeframe::Timeframe;
use multitrader::ports::clock_port::Clock;
use multitrader::ports::log_port::LogSink;
use multitrader::ports::terminal_port::{
    AccountInfo, OrderResponse, OrderStatus, SymbolInfo, TerminalPort, Tick, TradeMode,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Scriptable terminal. Every field can be changed between cycles.
pub struct MockTerminal {
    pub bars: Mutex<HashMap<String, Vec<PriceBar>>>,
    pub symbols: Mutex<HashMap<String, SymbolInfo>>,
    pub ticks: Mutex<HashMap<String, Tick>>,
    pub account: Mutex<AccountInfo>,
    pub positions: Mutex<usize>,
    pub fetch_error: Mutex<Option<String>>,
    pub position_error: Mutex<Option<String>>,
    pub reject_with: Mutex<Option<(u32, String)>>,
    pub panic_asset: Mutex<Option<String>>,
    pub fetch_delay: Mutex<Option<Duration>>,
    pub submitted: Mutex<Vec<OrderRequest>>,
    pub fetches: Mutex<usize>,
    next_ticket: Mutex<u64>,
}

impl MockTerminal {
    pub fn new() -> Self {
        Self {
            bars: Mutex::new(HashMap::new()),
            symbols: Mutex::new(HashMap::new()),
            ticks: Mutex::new(HashMap::new()),
            account: Mutex::new(AccountInfo {
                balance: 10_000.0,
                equity: 10_000.0,
            }),
            positions: Mutex::new(0),
            fetch_error: Mutex::new(None),
            position_error: Mutex::new(None),
            reject_with: Mutex::new(None),
            panic_asset: Mutex::new(None),
            fetch_delay: Mutex::new(None),
            submitted: Mutex::new(Vec::new()),
            fetches: Mutex::new(0),
            next_ticket: Mutex::new(1000),
        }
    }

    /// Registers a tradable symbol quoted at the last close, with bid/ask
    /// `spread` apart.
    pub fn with_asset(self, asset: &str, bars: Vec<PriceBar>, spread: f64) -> Self {
        let last = bars.last().map(|b| b.close).unwrap_or(100.0);
        self.symbols
            .lock()
            .unwrap()
            .insert(asset.to_string(), tradable_symbol(0.01));
        self.ticks.lock().unwrap().insert(
            asset.to_string(),
            Tick {
                bid: last,
                ask: last + spread,
            },
        );
        self.bars.lock().unwrap().insert(asset.to_string(), bars);
        self
    }

    pub fn set_positions(&self, open: usize) {
        *self.positions.lock().unwrap() = open;
    }

    pub fn set_equity(&self, equity: f64) {
        self.account.lock().unwrap().equity = equity;
    }

    pub fn set_tick(&self, asset: &str, bid: f64, ask: f64) {
        self.ticks
            .lock()
            .unwrap()
            .insert(asset.to_string(), Tick { bid, ask });
    }

    /// Makes every subsequent `fetch_bars` call sleep first.
    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock().unwrap() = Some(delay);
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

impl TerminalPort for MockTerminal {
    fn fetch_bars(
        &self,
        asset: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        *self.fetches.lock().unwrap() += 1;
        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            std::thread::sleep(delay);
        }
        if self.panic_asset.lock().unwrap().as_deref() == Some(asset) {
            panic!("simulated terminal crash");
        }
        if let Some(reason) = self.fetch_error.lock().unwrap().clone() {
            return Err(TraderError::Terminal { reason });
        }
        let bars = self
            .bars
            .lock()
            .unwrap()
            .get(asset)
            .cloned()
            .unwrap_or_default();
        let start = bars.len().saturating_sub(count);
        Ok(bars[start..].to_vec())
    }

    fn symbol_info(&self, asset: &str) -> Result<Option<SymbolInfo>, TraderError> {
        Ok(self.symbols.lock().unwrap().get(asset).cloned())
    }

    fn tick(&self, asset: &str) -> Result<Option<Tick>, TraderError> {
        Ok(self.ticks.lock().unwrap().get(asset).copied())
    }

    fn account_info(&self) -> Result<AccountInfo, TraderError> {
        Ok(*self.account.lock().unwrap())
    }

    fn open_position_count(&self) -> Result<usize, TraderError> {
        if let Some(reason) = self.position_error.lock().unwrap().clone() {
            return Err(TraderError::Terminal { reason });
        }
        Ok(*self.positions.lock().unwrap())
    }

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderResponse, TraderError> {
        self.submitted.lock().unwrap().push(request.clone());
        if let Some((code, comment)) = self.reject_with.lock().unwrap().clone() {
            return Ok(OrderResponse {
                ticket: 0,
                status: OrderStatus::Rejected { code, comment },
            });
        }
        let mut next = self.next_ticket.lock().unwrap();
        let ticket = *next;
        *next += 1;
        Ok(OrderResponse {
            ticket,
            status: OrderStatus::Done,
        })
    }
}

pub fn tradable_symbol(point: f64) -> SymbolInfo {
    SymbolInfo {
        visible: true,
        trade_mode: TradeMode::Full,
        point,
        tick_value: 1.0,
        volume_min: 0.01,
        volume_max: 100.0,
    }
}

pub struct FixedClock(pub NaiveTime);

impl FixedClock {
    pub fn at(hour: u32, minute: u32) -> Self {
        Self(NaiveTime::from_hms_opt(hour, minute, 0).unwrap())
    }
}

impl Clock for FixedClock {
    fn now_time(&self) -> NaiveTime {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub asset: String,
    pub message: String,
    pub warning: bool,
}

#[derive(Default)]
pub struct RecordingLogSink {
    pub lines: Mutex<Vec<LogLine>>,
}

impl RecordingLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<LogLine> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|l| l.message.contains(needle))
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|l| l.warning)
            .map(|l| l.message)
            .collect()
    }

    fn push(&self, asset: &str, message: &str, warning: bool) {
        self.lines.lock().unwrap().push(LogLine {
            asset: asset.to_string(),
            message: message.to_string(),
            warning,
        });
    }
}

impl LogSink for RecordingLogSink {
    fn log(&self, asset: &str, message: &str) {
        self.push(asset, message, false);
    }

    fn warn(&self, asset: &str, message: &str) {
        self.push(asset, message, true);
    }
}

fn minute(i: usize) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 4)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + chrono::Duration::minutes(i as i64)
}

/// One bar per close, high/low `spread` either side, minute timestamps.
pub fn bars_from_closes(closes: &[f64], volumes: &[u64], spread: f64) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| PriceBar {
            timestamp: minute(i),
            open: close,
            high: close + spread,
            low: close - spread,
            close,
            tick_volume: volumes.get(i).copied().unwrap_or(100),
        })
        .collect()
}

/// Steady rise of `step` per bar from `start`, with a volume spike on the
/// last bar.
pub fn uptrend_bars(n: usize, start: f64, step: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..n).map(|i| start + i as f64 * step).collect();
    let mut volumes = vec![100u64; n];
    if let Some(last) = volumes.last_mut() {
        *last = 500;
    }
    bars_from_closes(&closes, &volumes, 0.2)
}

/// Steady fall of `step` per bar from `start`, with a volume spike on the
/// last bar.
pub fn downtrend_bars(n: usize, start: f64, step: f64) -> Vec<PriceBar> {
    let closes: Vec<f64> = (0..n).map(|i| start - i as f64 * step).collect();
    let mut volumes = vec![100u64; n];
    if let Some(last) = volumes.last_mut() {
        *last = 500;
    }
    bars_from_closes(&closes, &volumes, 0.2)
}

pub fn flat_bars(n: usize, level: f64) -> Vec<PriceBar> {
    bars_from_closes(&vec![level; n], &[], 0.2)
}

pub fn assert_approx(actual: f64, expected: f64, tol: f64) {
    assert!(
        (actual - expected).abs() < tol,
        "expected {expected}, got {actual} (tol {tol})"
    );
}
