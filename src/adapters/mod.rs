//! Concrete adapter implementations for ports.

pub mod file_config_adapter;
pub mod paper_terminal;
pub mod system_clock;
pub mod tracing_log_adapter;
