//! Retry scheduler
//!
//! Drives one monitoring cycle as a series of passes:
//! 1. Pass 1 samples every instrument
//! 2. Later passes sample only instruments requeued by the previous pass
//! 3. The cycle ends when a pass requeues nothing
//!
//! Instruments are sampled one at a time; the data source is a shared,
//! stateful session.
//!
//! A refused connection only fails that sample. The source is declared
//! unavailable when no instrument could connect for
//! [`UNREACHABLE_PASSES_FATAL`] consecutive passes.

pub mod evaluation;


pub use evaluation::{Evaluation, RetryPolicy, SpreadReading, TrackingItem};

use crate::error::{MonitorError, Result};
use crate::monitor::MonitorState;
use crate::orderbook::{parse_snapshot, BookMetrics, MetricsConfig, OrderBook};
use crate::source::SnapshotSource;
use crate::types::{Instrument, Verdict};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Consecutive all-unreachable passes that end the run
pub const UNREACHABLE_PASSES_FATAL: u32 = 2;

/// One successful, usable sample
#[derive(Debug, Clone)]
pub struct Sample {
    pub book: OrderBook,
    pub metrics: BookMetrics,
    pub reading: SpreadReading,
    pub taken_at: DateTime<Utc>,
}

/// Final result of one instrument for one cycle
#[derive(Debug, Clone)]
pub struct InstrumentOutcome {
    pub instrument: Instrument,
    pub verdict: Verdict,
    /// Item as it stood when resolved; seeds the next cycle
    pub item: TrackingItem,
    /// Samples attempted this cycle
    pub attempts: u32,
    /// Most recent usable sample this cycle
    pub last_sample: Option<Sample>,
    /// Most recent sampling error this cycle
    pub last_error: Option<String>,
}

impl InstrumentOutcome {
    pub fn next_item(&self) -> TrackingItem {
        self.item.next_cycle(self.verdict)
    }
}

/// Summary of a completed cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    pub cycle: u64,
    pub passes: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Outcomes in instrument order
    pub outcomes: Vec<InstrumentOutcome>,
}

impl CycleReport {
    pub fn count(&self, verdict: Verdict) -> usize {
        self.outcomes.iter().filter(|o| o.verdict == verdict).count()
    }

    pub fn outcome(&self, symbol: &str) -> Option<&InstrumentOutcome> {
        self.outcomes.iter().find(|o| o.instrument.symbol == symbol)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Queue entry while a cycle is in progress
struct Tracked {
    index: usize,
    item: TrackingItem,
    attempts: u32,
    last_sample: Option<Sample>,
    last_error: Option<String>,
}

impl Tracked {
    fn into_outcome(self, verdict: Verdict) -> (usize, InstrumentOutcome) {
        (
            self.index,
            InstrumentOutcome {
                instrument: self.item.instrument.clone(),
                verdict,
                item: self.item,
                attempts: self.attempts,
                last_sample: self.last_sample,
                last_error: self.last_error,
            },
        )
    }
}

pub struct RetryScheduler {
    source: Arc<dyn SnapshotSource>,
    policy: RetryPolicy,
    metrics: MetricsConfig,
    sample_timeout: Duration,
    state: MonitorState,
}

impl RetryScheduler {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        policy: RetryPolicy,
        metrics: MetricsConfig,
        sample_timeout: Duration,
        state: MonitorState,
    ) -> Self {
        Self {
            source,
            policy,
            metrics,
            sample_timeout,
            state,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    /// Fetch, parse and score one instrument
    pub async fn sample(&self, instrument: &Instrument) -> Result<Sample> {
        let symbol = &instrument.symbol;

        let fetched = tokio::time::timeout(self.sample_timeout, self.source.fetch_snapshot(symbol))
            .await
            .map_err(|_| MonitorError::SampleTimeout {
                symbol: symbol.clone(),
                timeout_ms: self.sample_timeout.as_millis() as u64,
            })?;
        let raw = fetched?;

        let book = parse_snapshot(&raw);
        let spread_percent = book.spread_percent.ok_or_else(|| {
            MonitorError::ParseAmbiguity(format!("no spread percentage in snapshot for {}", symbol))
        })?;

        let metrics = BookMetrics::compute(&book, &self.metrics);
        let reading = self
            .policy
            .reading(spread_percent, instrument.target_spread_percent);

        Ok(Sample {
            book,
            metrics,
            reading,
            taken_at: Utc::now(),
        })
    }

    /// Run one cycle to a stable verdict for every instrument.
    ///
    /// Cancellation is checked between instruments and between passes and
    /// yields [`MonitorError::Cancelled`]. A fatal source error aborts the
    /// cycle; any other sampling error only fails that sample.
    pub async fn run_cycle(
        &self,
        cycle: u64,
        items: Vec<TrackingItem>,
        cancel: &CancellationToken,
    ) -> Result<CycleReport> {
        let started_at = Utc::now();
        let total = items.len();

        let mut queue: Vec<Tracked> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| Tracked {
                index,
                item,
                attempts: 0,
                last_sample: None,
                last_error: None,
            })
            .collect();
        let mut resolved: Vec<(usize, InstrumentOutcome)> = Vec::with_capacity(total);
        let mut passes = 0u32;
        let mut unreachable_passes = 0u32;

        while !queue.is_empty() {
            if cancel.is_cancelled() {
                return Err(MonitorError::Cancelled);
            }

            passes += 1;
            debug!(
                "[Scheduler] Cycle {} pass {}: {} instrument(s) queued",
                cycle,
                passes,
                queue.len()
            );

            let mut next_pass = Vec::new();
            let mut sampled = 0usize;
            let mut unreachable = 0usize;
            let mut last_unreachable = None;

            for mut tracked in queue {
                if cancel.is_cancelled() {
                    return Err(MonitorError::Cancelled);
                }

                let symbol = tracked.item.instrument.symbol.clone();
                self.state.set_progress(cycle, passes, Some(&symbol));
                tracked.attempts += 1;
                sampled += 1;

                let evaluation = match self.sample(&tracked.item.instrument).await {
                    Ok(sample) => {
                        let evaluation = tracked.item.evaluate_sample(&sample.reading, &self.policy);
                        debug!(
                            "[Scheduler] {} spread={:.4}% target={:.4}% diff={:+.2}% -> {}",
                            symbol,
                            sample.reading.spread_percent,
                            sample.reading.target_spread_percent,
                            sample.reading.percent_diff,
                            evaluation.display_status()
                        );
                        self.state.record_sample(
                            &symbol,
                            &sample,
                            evaluation.display_status(),
                            tracked.item.warn_retry_count,
                            tracked.item.fail_retry_count,
                        );
                        tracked.last_sample = Some(sample);
                        evaluation
                    }
                    Err(e) if e.is_fatal() => {
                        error!("[Scheduler] Data source failed while sampling {}: {}", symbol, e);
                        return Err(e);
                    }
                    Err(e) => {
                        if e.is_unreachable() {
                            unreachable += 1;
                            last_unreachable = Some(e.to_string());
                        }
                        let evaluation = tracked.item.record_failure(&self.policy);
                        warn!(
                            "[Scheduler] Sample failed for {} ({}): {}",
                            symbol,
                            evaluation.display_status(),
                            e
                        );
                        self.state.record_failure(
                            &symbol,
                            evaluation.display_status(),
                            tracked.item.warn_retry_count,
                            tracked.item.fail_retry_count,
                        );
                        tracked.last_error = Some(e.to_string());
                        evaluation
                    }
                };

                match evaluation {
                    Evaluation::Requeue(_) => next_pass.push(tracked),
                    Evaluation::Resolved(verdict) => resolved.push(tracked.into_outcome(verdict)),
                }
            }

            if sampled > 0 && unreachable == sampled {
                unreachable_passes += 1;
                warn!(
                    "[Scheduler] Cycle {} pass {}: no instrument reachable ({} consecutive)",
                    cycle, passes, unreachable_passes
                );
                if unreachable_passes >= UNREACHABLE_PASSES_FATAL {
                    let err = MonitorError::SourceUnavailable(format!(
                        "no instrument reachable for {} consecutive passes: {}",
                        unreachable_passes,
                        last_unreachable.unwrap_or_default()
                    ));
                    error!("[Scheduler] {}", err);
                    return Err(err);
                }
            } else {
                unreachable_passes = 0;
            }

            queue = next_pass;
        }

        self.state.set_progress(cycle, passes, None);
        resolved.sort_by_key(|(index, _)| *index);

        let report = CycleReport {
            cycle,
            passes,
            started_at,
            finished_at: Utc::now(),
            outcomes: resolved.into_iter().map(|(_, outcome)| outcome).collect(),
        };

        info!(
            "[Scheduler] Cycle {} resolved in {} pass(es): {} okay, {} warning, {} failed",
            cycle,
            passes,
            report.count(Verdict::Okay),
            report.count(Verdict::Warning),
            report.count(Verdict::Failed)
        );

        Ok(report)
    }
}
