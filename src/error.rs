//! Error types for the spread monitor

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MonitorError {
    #[error("Sample timed out for {symbol} after {timeout_ms}ms")]
    SampleTimeout { symbol: String, timeout_ms: u64 },

    #[error("Sample failed for {symbol}: {reason}")]
    Sample { symbol: String, reason: String },

    #[error("Cannot reach data source for {symbol}: {reason}")]
    Unreachable { symbol: String, reason: String },

    #[error("Snapshot parse error: {0}")]
    ParseAmbiguity(String),

    #[error("Data source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("Audit log error: {0}")]
    Audit(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Monitoring cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MonitorError {
    /// Errors that end the monitoring run instead of failing one sample.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }

    /// A sample that could not connect to the source at all.
    pub fn is_unreachable(&self) -> bool {
        matches!(self, Self::Unreachable { .. })
    }

    /// Per-instrument sampling failures, retried by the scheduler.
    pub fn is_sample_failure(&self) -> bool {
        matches!(
            self,
            Self::SampleTimeout { .. }
                | Self::Sample { .. }
                | Self::Unreachable { .. }
                | Self::ParseAmbiguity(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MonitorError>;
