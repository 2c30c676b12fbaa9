//! Core types shared across the monitor

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monitored trading instrument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    /// Unique market symbol, e.g. `BTC_USDT`
    pub symbol: String,
    /// Expected healthy spread for this market, in percent
    pub target_spread_percent: f64,
}

impl Instrument {
    pub fn new(symbol: impl Into<String>, target_spread_percent: f64) -> Self {
        Self {
            symbol: symbol.into(),
            target_spread_percent,
        }
    }
}

/// Health status of an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Pending,
    Okay,
    Warning,
    Failed,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Okay => "Okay",
            Self::Warning => "Warning",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final per-cycle verdict for an instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Okay,
    Warning,
    Failed,
}

impl From<Verdict> for Status {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Okay => Status::Okay,
            Verdict::Warning => Status::Warning,
            Verdict::Failed => Status::Failed,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Status::from(*self).fmt(f)
    }
}

/// Which retry budget an in-cycle retry is drawing from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    PoorSpread,
    SampleFailure,
}

/// Display-only annotation for an instrument queued for another pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAnnotation {
    pub kind: RetryKind,
    pub attempt: u32,
    pub max: u32,
}

impl RetryAnnotation {
    pub fn poor_spread(attempt: u32, max: u32) -> Self {
        Self {
            kind: RetryKind::PoorSpread,
            attempt,
            max,
        }
    }

    pub fn sample_failure(attempt: u32, max: u32) -> Self {
        Self {
            kind: RetryKind::SampleFailure,
            attempt,
            max,
        }
    }
}

/// Status as shown in the live table.
///
/// Only the UI formats this; health tracking consumes [`Verdict`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayStatus {
    pub status: Status,
    pub retry: Option<RetryAnnotation>,
}

impl DisplayStatus {
    pub fn pending() -> Self {
        Self {
            status: Status::Pending,
            retry: None,
        }
    }

    pub fn resolved(verdict: Verdict) -> Self {
        Self {
            status: verdict.into(),
            retry: None,
        }
    }

    pub fn retrying(annotation: RetryAnnotation) -> Self {
        let status = match annotation.kind {
            RetryKind::PoorSpread => Status::Warning,
            RetryKind::SampleFailure => Status::Failed,
        };
        Self {
            status,
            retry: Some(annotation),
        }
    }

    pub fn is_retrying(&self) -> bool {
        self.retry.is_some()
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.retry) {
            (Status::Pending, _) => f.write_str("Pending..."),
            (status, Some(retry)) => {
                write!(f, "{} (Retry {}/{})", status, retry.attempt, retry.max)
            }
            (Status::Failed, None) => f.write_str("Failed Permanently"),
            (status, None) => status.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_labels() {
        assert_eq!(DisplayStatus::pending().to_string(), "Pending...");
        assert_eq!(DisplayStatus::resolved(Verdict::Okay).to_string(), "Okay");
        assert_eq!(DisplayStatus::resolved(Verdict::Warning).to_string(), "Warning");
        assert_eq!(
            DisplayStatus::resolved(Verdict::Failed).to_string(),
            "Failed Permanently"
        );
        assert_eq!(
            DisplayStatus::retrying(RetryAnnotation::poor_spread(1, 3)).to_string(),
            "Warning (Retry 1/3)"
        );
        assert_eq!(
            DisplayStatus::retrying(RetryAnnotation::sample_failure(2, 3)).to_string(),
            "Failed (Retry 2/3)"
        );
    }

    #[test]
    fn test_retrying_status_keeps_enum_separate() {
        let display = DisplayStatus::retrying(RetryAnnotation::poor_spread(2, 3));
        assert_eq!(display.status, Status::Warning);
        assert!(display.is_retrying());
    }

    #[test]
    fn test_verdict_into_status() {
        assert_eq!(Status::from(Verdict::Okay), Status::Okay);
        assert_eq!(Status::from(Verdict::Warning), Status::Warning);
        assert_eq!(Status::from(Verdict::Failed), Status::Failed);
    }

    #[test]
    fn test_instrument_deserialization() {
        let json = r#"{"symbol": "BTC_USDT", "target_spread_percent": 0.2}"#;
        let instrument: Instrument = serde_json::from_str(json).unwrap();
        assert_eq!(instrument, Instrument::new("BTC_USDT", 0.2));
    }
}
