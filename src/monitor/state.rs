//! Live results table
//!
//! Written after every single sample, read by UI layers on their own
//! cadence. Each write replaces one instrument's row under the lock.

use super::history::{HistoryPoint, MetricHistory};
use crate::orderbook::metrics::{BandDepth, SideVolume};
use crate::scheduler::Sample;
use crate::types::{DisplayStatus, Instrument, Status};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;

/// One instrument's line in the live table
#[derive(Debug, Clone)]
pub struct InstrumentRow {
    pub symbol: String,
    pub target_spread_percent: f64,
    pub current_spread_percent: Option<f64>,
    /// `current - target`, rounded to 4 dp
    pub difference: Option<f64>,
    /// Deviation from target in percent, rounded to 2 dp
    pub percent_diff: Option<f64>,
    pub depths: Vec<BandDepth>,
    pub dws: Option<f64>,
    /// One-sided volume within the volume band
    pub volume: Option<SideVolume>,
    pub status: DisplayStatus,
    pub last_updated: Option<DateTime<Utc>>,
    pub warn_retry_count: u32,
    pub fail_retry_count: u32,
    pub history: MetricHistory,
}

impl InstrumentRow {
    fn new(instrument: &Instrument) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            target_spread_percent: instrument.target_spread_percent,
            current_spread_percent: None,
            difference: None,
            percent_diff: None,
            depths: Vec::new(),
            dws: None,
            volume: None,
            status: DisplayStatus::pending(),
            last_updated: None,
            warn_retry_count: 0,
            fail_retry_count: 0,
            history: MetricHistory::new(),
        }
    }

    pub fn last_updated_label(&self) -> String {
        self.last_updated
            .map(|t| t.format("%H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string())
    }
}

/// Where the scheduler currently is
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Progress {
    pub cycle: u64,
    pub pass: u32,
    /// Symbol being sampled, `None` between cycles
    pub symbol: Option<String>,
}

#[derive(Debug)]
struct Inner {
    rows: Vec<InstrumentRow>,
    progress: Progress,
}

/// Shared live state. Cloning shares the same table.
#[derive(Debug, Clone)]
pub struct MonitorState {
    inner: Arc<RwLock<Inner>>,
}

impl MonitorState {
    pub fn new(instruments: &[Instrument]) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                rows: instruments.iter().map(InstrumentRow::new).collect(),
                progress: Progress::default(),
            })),
        }
    }

    pub fn set_progress(&self, cycle: u64, pass: u32, symbol: Option<&str>) {
        self.inner.write().progress = Progress {
            cycle,
            pass,
            symbol: symbol.map(str::to_string),
        };
    }

    pub fn progress(&self) -> Progress {
        self.inner.read().progress.clone()
    }

    /// Record a usable sample and its display status
    pub fn record_sample(
        &self,
        symbol: &str,
        sample: &Sample,
        status: DisplayStatus,
        warn_retry_count: u32,
        fail_retry_count: u32,
    ) {
        self.update_row(symbol, |row| {
            let reading = &sample.reading;
            row.current_spread_percent = Some(reading.spread_percent);
            row.difference = Some(round_to(reading.difference, 4));
            row.percent_diff = Some(round_to(reading.percent_diff, 2));
            row.depths = sample.metrics.depths.clone();
            row.dws = sample.metrics.dws;
            row.volume = sample.metrics.volume;
            row.status = status;
            row.last_updated = Some(sample.taken_at);
            row.warn_retry_count = warn_retry_count;
            row.fail_retry_count = fail_retry_count;

            let volume = sample.metrics.volume.unwrap_or_default();
            row.history.push(HistoryPoint {
                timestamp: sample.taken_at,
                spread_percent: reading.spread_percent,
                total_volume: volume.total(),
                imbalance: volume.imbalance(),
                bid_orders: volume.bid_orders,
                ask_orders: volume.ask_orders,
            });
        });
    }

    /// Record a failed sample. Last good readings are kept.
    pub fn record_failure(
        &self,
        symbol: &str,
        status: DisplayStatus,
        warn_retry_count: u32,
        fail_retry_count: u32,
    ) {
        self.update_row(symbol, |row| {
            row.status = status;
            row.warn_retry_count = warn_retry_count;
            row.fail_retry_count = fail_retry_count;
        });
    }

    /// Read-only copy of the whole table
    pub fn snapshot(&self) -> Vec<InstrumentRow> {
        self.inner.read().rows.clone()
    }

    pub fn row(&self, symbol: &str) -> Option<InstrumentRow> {
        self.inner
            .read()
            .rows
            .iter()
            .find(|r| r.symbol == symbol)
            .cloned()
    }

    /// Rows currently showing a settled warning
    pub fn warning_rows(&self) -> Vec<InstrumentRow> {
        self.inner
            .read()
            .rows
            .iter()
            .filter(|r| r.status.status == Status::Warning && !r.status.is_retrying())
            .cloned()
            .collect()
    }

    fn update_row(&self, symbol: &str, apply: impl FnOnce(&mut InstrumentRow)) {
        let mut inner = self.inner.write();
        match inner.rows.iter_mut().find(|r| r.symbol == symbol) {
            Some(row) => apply(row),
            None => tracing::warn!("[State] Update for unknown instrument {}", symbol),
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
