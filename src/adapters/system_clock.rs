//! Wall clock in the local timezone.

use chrono::{Local, NaiveTime};

use crate::ports::clock_port::Clock;

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_time(&self) -> NaiveTime {
        Local::now().time()
    }
}
