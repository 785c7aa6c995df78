//! Core domain types and logic.

pub mod bar;
pub mod config_validation;
pub mod coordinator;
pub mod error;
pub mod indicator;
pub mod order;
pub mod risk;
pub mod signal;
pub mod strategy;
pub mod strategy_loop;
pub mod timeframe;
