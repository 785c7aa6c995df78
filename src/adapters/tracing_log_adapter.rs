//! `LogSink` adapter that forwards status lines to `tracing`.

use tracing::{info, warn};

use crate::ports::log_port::LogSink;

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl TracingLogSink {
    pub fn new() -> Self {
        Self
    }
}

impl LogSink for TracingLogSink {
    fn log(&self, asset: &str, message: &str) {
        info!(asset, "{message}");
    }

    fn warn(&self, asset: &str, message: &str) {
        warn!(asset, "{message}");
    }
}
