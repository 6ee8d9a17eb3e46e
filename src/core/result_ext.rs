//! Result helpers for paths with no caller to propagate to
//!
//! Engine callbacks arrive with no waiting caller frame, so their errors are
//! logged and dropped here instead of being unwrapped.

/// Log-and-discard extension for `Result`
pub trait ResultExt<T> {
    /// Returns `Some(value)` on success; logs the error at `warn` and returns `None` otherwise.
    fn ok_or_log(self, context: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn ok_or_log(self, context: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("{} failed: {}", context, e);
                None
            }
        }
    }
}
