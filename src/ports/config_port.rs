//! Configuration access port trait.

use chrono::NaiveTime;

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
    fn get_double(&self, section: &str, key: &str, default: f64) -> f64;

    /// Raw value parsed as `HH:MM` (or `HH:MM:SS`); `None` when absent.
    /// A present but malformed value is returned as `Some(Err(raw))`.
    fn get_time(&self, section: &str, key: &str) -> Option<Result<NaiveTime, String>> {
        self.get_string(section, key).map(|raw| {
            let trimmed = raw.trim();
            NaiveTime::parse_from_str(trimmed, "%H:%M")
                .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
                .map_err(|_| raw.clone())
        })
    }
}
