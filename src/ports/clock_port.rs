//! Wall-clock port used by the trading session check.

use chrono::NaiveTime;

pub trait Clock: Send + Sync {
    /// Current time of day in the terminal's session zone.
    fn now_time(&self) -> NaiveTime;
}
