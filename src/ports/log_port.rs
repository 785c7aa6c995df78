//! Status log sink port.

/// Receives human-readable status lines, one per call. Implementations must
/// return quickly; rendering is their own concern.
pub trait LogSink: Send + Sync {
    fn log(&self, asset: &str, message: &str);

    /// Rejections and failures. Defaults to [`LogSink::log`].
    fn warn(&self, asset: &str, message: &str) {
        self.log(asset, message);
    }
}
