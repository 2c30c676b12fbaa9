//! Per-instrument sample evaluation
//!
//! Decides, for one sample, whether an instrument is resolved for this
//! cycle or goes back on the queue for another pass.

use crate::types::{DisplayStatus, Instrument, RetryAnnotation, Status, Verdict};
use serde::Deserialize;

/// Retry and spread-quality policy
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Extra passes allowed for a poor spread reading
    pub max_warn_retries: u32,
    /// Extra passes allowed for failed samples
    pub max_fail_retries: u32,
    /// Spread more than this percent above target is poor
    pub poor_upper_pct: f64,
    /// Spread more than this percent below target (negative) is poor
    pub poor_lower_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_warn_retries: 3,
            max_fail_retries: 3,
            poor_upper_pct: 100.0,
            poor_lower_pct: -40.0,
        }
    }
}

impl RetryPolicy {
    pub fn is_poor(&self, percent_diff: f64) -> bool {
        percent_diff > self.poor_upper_pct || percent_diff < self.poor_lower_pct
    }

    /// Score a sampled spread against an instrument's target
    pub fn reading(&self, spread_percent: f64, target_spread_percent: f64) -> SpreadReading {
        let difference = spread_percent - target_spread_percent;
        let percent_diff = difference / target_spread_percent * 100.0;
        SpreadReading {
            spread_percent,
            target_spread_percent,
            difference,
            percent_diff,
            is_poor: self.is_poor(percent_diff),
        }
    }
}

/// A sampled spread compared to its target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpreadReading {
    pub spread_percent: f64,
    pub target_spread_percent: f64,
    /// `spread - target`, in percentage points
    pub difference: f64,
    /// Deviation from target, in percent of target
    pub percent_diff: f64,
    pub is_poor: bool,
}

/// Outcome of evaluating one sample
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Evaluation {
    /// Sample again in the next pass
    Requeue(RetryAnnotation),
    /// Final verdict for this cycle
    Resolved(Verdict),
}

impl Evaluation {
    pub fn display_status(&self) -> DisplayStatus {
        match self {
            Self::Requeue(annotation) => DisplayStatus::retrying(*annotation),
            Self::Resolved(verdict) => DisplayStatus::resolved(*verdict),
        }
    }
}

/// Per-instrument state for one monitoring cycle
#[derive(Debug, Clone, PartialEq)]
pub struct TrackingItem {
    pub instrument: Instrument,
    pub warn_retry_count: u32,
    pub fail_retry_count: u32,
    /// Verdict the instrument ended the previous cycle with
    pub previous_cycle_status: Status,
}

impl TrackingItem {
    pub fn new(instrument: Instrument) -> Self {
        Self {
            instrument,
            warn_retry_count: 0,
            fail_retry_count: 0,
            previous_cycle_status: Status::Pending,
        }
    }

    /// Evaluate a successful sample
    pub fn evaluate_sample(&mut self, reading: &SpreadReading, policy: &RetryPolicy) -> Evaluation {
        // A confirmed bad market is not re-sampled within the cycle.
        if self.previous_cycle_status == Status::Warning && reading.is_poor {
            return Evaluation::Resolved(Verdict::Warning);
        }

        if !reading.is_poor {
            return Evaluation::Resolved(Verdict::Okay);
        }

        if self.warn_retry_count < policy.max_warn_retries {
            self.warn_retry_count += 1;
            Evaluation::Requeue(RetryAnnotation::poor_spread(
                self.warn_retry_count,
                policy.max_warn_retries,
            ))
        } else {
            Evaluation::Resolved(Verdict::Warning)
        }
    }

    /// Record a failed sample (source error, timeout or unusable snapshot)
    pub fn record_failure(&mut self, policy: &RetryPolicy) -> Evaluation {
        self.fail_retry_count += 1;
        if self.fail_retry_count <= policy.max_fail_retries {
            Evaluation::Requeue(RetryAnnotation::sample_failure(
                self.fail_retry_count,
                policy.max_fail_retries,
            ))
        } else {
            Evaluation::Resolved(Verdict::Failed)
        }
    }

    /// Item for the next cycle.
    ///
    /// The warning counter carries over unless the verdict is `Okay`. The
    /// failure counter always starts from zero, so a `Failed` verdict is
    /// terminal for its own cycle only.
    pub fn next_cycle(&self, verdict: Verdict) -> Self {
        let warn_retry_count = match verdict {
            Verdict::Okay => 0,
            Verdict::Warning | Verdict::Failed => self.warn_retry_count,
        };
        Self {
            instrument: self.instrument.clone(),
            warn_retry_count,
            fail_retry_count: 0,
            previous_cycle_status: verdict.into(),
        }
    }
}
