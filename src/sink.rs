//! Error-reporting sink.
//!
//! Recoverable shard errors are routed here instead of being raised across
//! shard boundaries. `capture` is fire-and-forget and must never panic.

use crate::error::FleetError;
use tracing::error;

/// Destination for recoverable errors caught at the shard boundary.
pub trait ErrorSink: Send + Sync + 'static {
    /// Report an error. Fire-and-forget; implementations must not panic.
    fn capture(&self, error: &FleetError);
}

/// Production sink: structured error events on the process log stream.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ErrorSink for LogSink {
    fn capture(&self, err: &FleetError) {
        error!(error = %err, error_type = err.error_type_label(), "Captured shard error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_sink_capture_does_not_panic() {
        let sink = LogSink;
        sink.capture(&FleetError::ShardPoll {
            shard_id: 2,
            source: Box::new(std::io::Error::new(std::io::ErrorKind::Other, "boom")),
        });
    }
}
