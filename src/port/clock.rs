use chrono::{DateTime, Utc};

/// Source of wall-clock time for the workers
///
/// Timer waits always go through `tokio::time`, so a clock whose wall time
/// follows tokio's (possibly paused) clock keeps both views consistent.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;

    fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }
}
