//! Rolling per-instrument metric history
//!
//! Keeps the last few successful samples so the live view can show
//! cycle-over-cycle changes and a short trend.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

/// Samples retained per instrument
pub const HISTORY_DEPTH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: DateTime<Utc>,
    pub spread_percent: f64,
    pub total_volume: f64,
    pub imbalance: f64,
    pub bid_orders: usize,
    pub ask_orders: usize,
}

/// Direction of the last three samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    InsufficientData,
    /// Spread widening and volume dropping on every step
    Deteriorating,
    Improving,
    Mixed,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InsufficientData => "Insufficient data",
            Self::Deteriorating => "Deteriorating",
            Self::Improving => "Improving",
            Self::Mixed => "Mixed",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Changes between the two most recent samples, in percent
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricChanges {
    pub spread_change: f64,
    pub volume_change: f64,
    pub imbalance_change: f64,
    pub trend: Trend,
}

impl Default for MetricChanges {
    fn default() -> Self {
        Self {
            spread_change: 0.0,
            volume_change: 0.0,
            imbalance_change: 0.0,
            trend: Trend::InsufficientData,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricHistory {
    points: VecDeque<HistoryPoint>,
}

impl MetricHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, point: HistoryPoint) {
        self.points.push_back(point);
        while self.points.len() > HISTORY_DEPTH {
            self.points.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn latest(&self) -> Option<&HistoryPoint> {
        self.points.back()
    }

    pub fn points(&self) -> impl Iterator<Item = &HistoryPoint> {
        self.points.iter()
    }

    pub fn changes(&self) -> MetricChanges {
        let n = self.points.len();
        if n < 2 {
            return MetricChanges::default();
        }

        let prev = &self.points[n - 2];
        let curr = &self.points[n - 1];

        let trend = if n == HISTORY_DEPTH {
            let p = &self.points;
            let spread_widening = p[2].spread_percent > p[1].spread_percent
                && p[1].spread_percent > p[0].spread_percent;
            let volume_dropping =
                p[2].total_volume < p[1].total_volume && p[1].total_volume < p[0].total_volume;

            match (spread_widening, volume_dropping) {
                (true, true) => Trend::Deteriorating,
                (false, false) => Trend::Improving,
                _ => Trend::Mixed,
            }
        } else {
            Trend::InsufficientData
        };

        MetricChanges {
            spread_change: pct_change(prev.spread_percent, curr.spread_percent),
            volume_change: pct_change(prev.total_volume, curr.total_volume),
            imbalance_change: pct_change(prev.imbalance, curr.imbalance),
            trend,
        }
    }
}

fn pct_change(prev: f64, curr: f64) -> f64 {
    if prev > 0.0 {
        (curr - prev) / prev * 100.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(spread: f64, volume: f64, imbalance: f64) -> HistoryPoint {
        HistoryPoint {
            timestamp: Utc::now(),
            spread_percent: spread,
            total_volume: volume,
            imbalance,
            bid_orders: 5,
            ask_orders: 5,
        }
    }

    #[test]
    fn test_history_bounded() {
        let mut history = MetricHistory::new();
        for i in 0..10 {
            history.push(point(i as f64, 100.0, 1.0));
        }
        assert_eq!(history.len(), HISTORY_DEPTH);
        assert_eq!(history.latest().unwrap().spread_percent, 9.0);
    }

    #[test]
    fn test_changes_need_two_points() {
        let mut history = MetricHistory::new();
        assert_eq!(history.changes(), MetricChanges::default());

        history.push(point(0.3, 1000.0, 1.0));
        assert_eq!(history.changes(), MetricChanges::default());
    }

    #[test]
    fn test_cycle_over_cycle_changes() {
        let mut history = MetricHistory::new();
        history.push(point(0.2, 1000.0, 1.0));
        history.push(point(0.3, 500.0, 2.0));

        let changes = history.changes();
        assert!((changes.spread_change - 50.0).abs() < 1e-9);
        assert!((changes.volume_change + 50.0).abs() < 1e-9);
        assert!((changes.imbalance_change - 100.0).abs() < 1e-9);
        assert_eq!(changes.trend, Trend::InsufficientData);
    }

    #[test]
    fn test_zero_previous_gives_zero_change() {
        let mut history = MetricHistory::new();
        history.push(point(0.2, 0.0, 0.0));
        history.push(point(0.2, 500.0, 1.0));

        let changes = history.changes();
        assert_eq!(changes.volume_change, 0.0);
        assert_eq!(changes.imbalance_change, 0.0);
    }

    #[test]
    fn test_deteriorating_trend() {
        let mut history = MetricHistory::new();
        history.push(point(0.2, 3000.0, 1.0));
        history.push(point(0.3, 2000.0, 1.0));
        history.push(point(0.5, 1000.0, 1.0));
        assert_eq!(history.changes().trend, Trend::Deteriorating);
    }

    #[test]
    fn test_improving_and_mixed_trend() {
        let mut history = MetricHistory::new();
        history.push(point(0.5, 1000.0, 1.0));
        history.push(point(0.3, 2000.0, 1.0));
        history.push(point(0.2, 3000.0, 1.0));
        assert_eq!(history.changes().trend, Trend::Improving);

        history.push(point(0.4, 2500.0, 1.0));
        history.push(point(0.6, 2600.0, 1.0));
        // spread widening across 0.2 -> 0.4 -> 0.6, volume not dropping
        assert_eq!(history.changes().trend, Trend::Mixed);
    }
}
