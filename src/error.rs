use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the monitoring core.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MonitorError {
    #[error("Invalid IP address: {0}")]
    InvalidAddress(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),

    #[error("ping interval must be above {min_ms} ms, got {got_ms} ms", min_ms = .min.as_millis(), got_ms = .got.as_millis())]
    IntervalTooShort { got: Duration, min: Duration },

    #[error("monitor has been shut down")]
    ShutDown,
}
