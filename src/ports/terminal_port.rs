//! Market data and execution terminal port.
//!
//! Every call is independent from the engine's point of view; the terminal
//! serializes access to its own connection.

use crate::domain::bar::PriceBar;
use crate::domain::error::TraderError;
use crate::domain::order::OrderRequest;
use crate::domain::timeframe::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeMode {
    Disabled,
    LongOnly,
    ShortOnly,
    CloseOnly,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolInfo {
    pub visible: bool,
    pub trade_mode: TradeMode,
    pub point: f64,
    pub tick_value: f64,
    pub volume_min: f64,
    pub volume_max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub bid: f64,
    pub ask: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AccountInfo {
    pub balance: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderStatus {
    Done,
    Rejected { code: u32, comment: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderResponse {
    pub ticket: u64,
    pub status: OrderStatus,
}

pub trait TerminalPort: Send + Sync {
    /// Most recent `count` bars, oldest first.
    fn fetch_bars(
        &self,
        asset: &str,
        timeframe: Timeframe,
        count: usize,
    ) -> Result<Vec<PriceBar>, TraderError>;

    /// `None` when the terminal does not know the symbol.
    fn symbol_info(&self, asset: &str) -> Result<Option<SymbolInfo>, TraderError>;

    /// `None` when no quote is available.
    fn tick(&self, asset: &str) -> Result<Option<Tick>, TraderError>;

    fn account_info(&self) -> Result<AccountInfo, TraderError>;

    /// Open positions across the whole account.
    fn open_position_count(&self) -> Result<usize, TraderError>;

    fn submit_order(&self, request: &OrderRequest) -> Result<OrderResponse, TraderError>;
}
