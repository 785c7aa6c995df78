//! Paper trading terminal backed by per-symbol CSV files.
//!
//! `{data_dir}/{SYMBOL}.csv` holds `timestamp,open,high,low,close,tick_volume`
//! rows in ascending time order. Every fetch reveals one more bar, so
//! repeated cycles replay the file as if it were a live feed. Quotes come
//! from the latest revealed close; balance and equity stay fixed and every
//! accepted order counts as one open position.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::domain::bar::PriceBar;
use crate::domain::error::TraderError;
use crate::domain::order::OrderRequest;
use crate::domain::timeframe::Timeframe;
use crate::ports::config_port::ConfigPort;
use crate::ports::terminal_port::{
    AccountInfo, OrderResponse, OrderStatus, SymbolInfo, TerminalPort, Tick, TradeMode,
};

/// Retcode reported for volumes outside the symbol limits.
pub const INVALID_VOLUME: u32 = 10014;

#[derive(Debug, Clone, PartialEq)]
pub struct PaperSettings {
    pub data_dir: PathBuf,
    pub balance: f64,
    pub spread_points: f64,
    pub point: f64,
    pub tick_value: f64,
    pub volume_min: f64,
    pub volume_max: f64,
}

impl Default for PaperSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            balance: 10_000.0,
            spread_points: 5.0,
            point: 0.01,
            tick_value: 1.0,
            volume_min: 0.01,
            volume_max: 100.0,
        }
    }
}

impl PaperSettings {
    /// Reads the `[paper]` section; relative data directories resolve
    /// against `base_dir`.
    pub fn from_config(config: &dyn ConfigPort, base_dir: &Path) -> Result<Self, TraderError> {
        let d = Self::default();
        let data_dir = config
            .get_string("paper", "data_dir")
            .map(|s| PathBuf::from(s.trim()))
            .unwrap_or(d.data_dir);
        let data_dir = if data_dir.is_relative() {
            base_dir.join(data_dir)
        } else {
            data_dir
        };

        let settings = Self {
            data_dir,
            balance: config.get_double("paper", "balance", d.balance),
            spread_points: config.get_double("paper", "spread_points", d.spread_points),
            point: config.get_double("paper", "point", d.point),
            tick_value: config.get_double("paper", "tick_value", d.tick_value),
            volume_min: config.get_double("paper", "volume_min", d.volume_min),
            volume_max: config.get_double("paper", "volume_max", d.volume_max),
        };

        if settings.point <= 0.0 {
            return Err(TraderError::config_invalid("paper", "point", "point must be positive"));
        }
        if settings.spread_points < 0.0 {
            return Err(TraderError::config_invalid(
                "paper",
                "spread_points",
                "spread_points must be non-negative",
            ));
        }
        if settings.volume_min <= 0.0 || settings.volume_min > settings.volume_max {
            return Err(TraderError::config_invalid(
                "paper",
                "volume_min",
                "volume limits must satisfy 0 < volume_min <= volume_max",
            ));
        }
        Ok(settings)
    }
}

struct Feed {
    bars: Vec<PriceBar>,
    /// Number of bars revealed so far.
    cursor: usize,
}

impl Feed {
    fn latest(&self) -> Option<&PriceBar> {
        self.bars.get(self.cursor.max(1) - 1)
    }
}

pub struct PaperTerminal {
    settings: PaperSettings,
    feeds: Mutex<HashMap<String, Feed>>,
    orders: Mutex<Vec<OrderRequest>>,
    next_ticket: AtomicU64,
}

impl PaperTerminal {
    pub fn new(settings: PaperSettings) -> Self {
        Self {
            settings,
            feeds: Mutex::new(HashMap::new()),
            orders: Mutex::new(Vec::new()),
            next_ticket: AtomicU64::new(1),
        }
    }

    pub fn settings(&self) -> &PaperSettings {
        &self.settings
    }

    fn csv_path(&self, asset: &str) -> PathBuf {
        self.settings.data_dir.join(format!("{asset}.csv"))
    }

    /// Accepted orders, oldest first.
    pub fn orders(&self) -> Vec<OrderRequest> {
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs `f` against the feed for `asset`, loading it on first use.
    /// `Ok(None)` when the symbol has no data file.
    fn with_feed<T>(
        &self,
        asset: &str,
        f: impl FnOnce(&mut Feed) -> T,
    ) -> Result<Option<T>, TraderError> {
        let mut feeds = self.feeds.lock().unwrap_or_else(PoisonError::into_inner);
        if !feeds.contains_key(asset) {
            let path = self.csv_path(asset);
            if !path.exists() {
                return Ok(None);
            }
            let bars = load_bars(asset, &path)?;
            debug!(asset, bars = bars.len(), path = %path.display(), "paper feed loaded");
            feeds.insert(asset.to_string(), Feed { bars, cursor: 0 });
        }
        Ok(feeds.get_mut(asset).map(f))
    }
}

fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn load_bars(asset: &str, path: &Path) -> Result<Vec<PriceBar>, TraderError> {
    let content = fs::read_to_string(path).map_err(|e| TraderError::Terminal {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;

    let mut rdr = csv::Reader::from_reader(content.as_bytes());
    let mut bars = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| invalid_row(asset, index, format!("CSV parse error: {e}")))?;
        bars.push(parse_row(asset, index, &record)?);
    }

    Ok(bars)
}

fn invalid_row(asset: &str, index: usize, reason: String) -> TraderError {
    TraderError::InvalidBar {
        asset: asset.to_string(),
        index,
        reason,
    }
}

fn column<'r>(
    record: &'r csv::StringRecord,
    asset: &str,
    index: usize,
    col: usize,
    name: &str,
) -> Result<&'r str, TraderError> {
    record
        .get(col)
        .map(str::trim)
        .ok_or_else(|| invalid_row(asset, index, format!("missing {name} column")))
}

fn parse_row(asset: &str, index: usize, record: &csv::StringRecord) -> Result<PriceBar, TraderError> {
    let price = |col: usize, name: &str| -> Result<f64, TraderError> {
        column(record, asset, index, col, name)?
            .parse::<f64>()
            .map_err(|e| invalid_row(asset, index, format!("invalid {name} value: {e}")))
    };

    let raw_ts = column(record, asset, index, 0, "timestamp")?;
    let timestamp = parse_timestamp(raw_ts)
        .ok_or_else(|| invalid_row(asset, index, format!("invalid timestamp '{raw_ts}'")))?;
    let tick_volume = column(record, asset, index, 5, "tick_volume")?
        .parse::<u64>()
        .map_err(|e| invalid_row(asset, index, format!("invalid tick_volume value: {e}")))?;

    Ok(PriceBar {
        timestamp,
        open: price(1, "open")?,
        high: price(2, "high")?,
        low: price(3, "low")?,
        close: price(4, "close")?,
        tick_volume,
    })
}

impl TerminalPort for PaperTerminal {
    /// The timeframe is not used: each symbol has a single bar file.
    fn fetch_bars(
        &self,
        asset: &str,
        _timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, TraderError> {
        let window = self.with_feed(asset, |feed| {
            feed.cursor = if feed.cursor == 0 {
                count.min(feed.bars.len())
            } else {
                (feed.cursor + 1).min(feed.bars.len())
            };
            let start = feed.cursor.saturating_sub(count);
            feed.bars[start..feed.cursor].to_vec()
        })?;
        window.ok_or_else(|| TraderError::Terminal {
            reason: format!("no bar file for {asset}"),
        })
    }

    fn symbol_info(&self, asset: &str) -> Result<Option<SymbolInfo>, TraderError> {
        if !self.csv_path(asset).exists() {
            return Ok(None);
        }
        Ok(Some(SymbolInfo {
            visible: true,
            trade_mode: TradeMode::Full,
            point: self.settings.point,
            tick_value: self.settings.tick_value,
            volume_min: self.settings.volume_min,
            volume_max: self.settings.volume_max,
        }))
    }

    fn tick(&self, asset: &str) -> Result<Option<Tick>, TraderError> {
        let spread = self.settings.spread_points * self.settings.point;
        let tick = self.with_feed(asset, |feed| {
            feed.latest().map(|bar| Tick {
                bid: bar.close,
                ask: bar.close + spread,
            })
        })?;
        Ok(tick.flatten())
    }

    fn account_info(&self) -> Result<AccountInfo, TraderError> {
        Ok(AccountInfo {
            balance: self.settings.balance,
            equity: self.settings.balance,
        })
    }

    fn open_position_count(&self) -> Result<usize, TraderError> {
        Ok(self.orders.lock().unwrap_or_else(PoisonError::into_inner).len())
    }

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderResponse, TraderError> {
        if !(self.settings.volume_min..=self.settings.volume_max).contains(&request.volume) {
            return Ok(OrderResponse {
                ticket: 0,
                status: OrderStatus::Rejected {
                    code: INVALID_VOLUME,
                    comment: format!("invalid volume {}", request.volume),
                },
            });
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        self.orders
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());
        debug!(asset = %request.asset, ticket, side = %request.side, "paper order accepted");
        Ok(OrderResponse {
            ticket,
            status: OrderStatus::Done,
        })
    }
}
