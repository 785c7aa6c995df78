//! Domain error types.

use crate::domain::indicator::IndicatorError;

/// How long a strategy loop waits after a failed cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Sleep the regular cycle interval.
    Normal,
    /// Sleep the extended backoff interval.
    Backoff,
}

/// Top-level error type for multitrader.
#[derive(Debug, thiserror::Error)]
pub enum TraderError {
    #[error("no bars returned for {asset}")]
    NoData { asset: String },

    #[error("failed to fetch bars for {asset}: {reason}")]
    FetchFailed { asset: String, reason: String },

    #[error("insufficient data for {asset}: have {bars} bars, need {minimum}")]
    InsufficientData {
        asset: String,
        bars: usize,
        minimum: usize,
    },

    #[error("invalid bar for {asset} at index {index}: {reason}")]
    InvalidBar {
        asset: String,
        index: usize,
        reason: String,
    },

    #[error(transparent)]
    Indicator(#[from] IndicatorError),

    #[error("invalid indicator reading: {reason}")]
    InvalidIndicator { reason: String },

    #[error("market unavailable for {asset}: {reason}")]
    MarketUnavailable { asset: String, reason: String },

    #[error("order rejected (code {code}): {comment}")]
    DispatchRejected { code: u32, comment: String },

    #[error("terminal error: {reason}")]
    Terminal { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TraderError {
    pub fn config_invalid(section: &str, key: &str, reason: impl Into<String>) -> Self {
        TraderError::ConfigInvalid {
            section: section.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    /// Sleep policy a strategy loop applies after this error ends a cycle.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            TraderError::NoData { .. }
            | TraderError::FetchFailed { .. }
            | TraderError::InsufficientData { .. }
            | TraderError::InvalidBar { .. }
            | TraderError::Indicator(_)
            | TraderError::InvalidIndicator { .. }
            | TraderError::MarketUnavailable { .. }
            | TraderError::DispatchRejected { .. } => RetryPolicy::Normal,
            TraderError::Terminal { .. }
            | TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. }
            | TraderError::Io(_) => RetryPolicy::Backoff,
        }
    }
}

impl From<&TraderError> for std::process::ExitCode {
    fn from(err: &TraderError) -> Self {
        let code: u8 = match err {
            TraderError::Io(_) => 1,
            TraderError::ConfigParse { .. }
            | TraderError::ConfigMissing { .. }
            | TraderError::ConfigInvalid { .. } => 2,
            TraderError::Terminal { .. } => 3,
            TraderError::Indicator(_) | TraderError::InvalidIndicator { .. } => 4,
            TraderError::NoData { .. }
            | TraderError::FetchFailed { .. }
            | TraderError::InsufficientData { .. }
            | TraderError::InvalidBar { .. } => 5,
            TraderError::MarketUnavailable { .. } | TraderError::DispatchRejected { .. } => 6,
        };
        std::process::ExitCode::from(code)
    }
}
