//! Order book liquidity metrics
//!
//! Pure functions of a parsed [`OrderBook`]:
//! - Mid price from the true best ask/bid
//! - Quote-currency depth within a percentage band of mid
//! - Dollar-weighted spread (size-weighted distance from mid near the touch)
//! - One-sided volumes, order counts and imbalance inside a band

use super::{OrderBook, PriceLevel};
use serde::{Deserialize, Serialize};

/// Metric parameters
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Bands (percent of mid) to report depth for
    pub depth_bands: Vec<f64>,
    /// Levels per side used for the dollar-weighted spread
    pub dws_levels: usize,
    /// Band used for the one-sided volume / imbalance breakdown
    pub volume_band: f64,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            depth_bands: vec![1.0, 2.0],
            dws_levels: 5,
            volume_band: 1.0,
        }
    }
}

/// Mid price, `(best_ask + best_bid) / 2`
pub fn mid_price(book: &OrderBook) -> Option<f64> {
    let best_ask = book.best_ask()?;
    let best_bid = book.best_bid()?;
    Some((best_ask + best_bid) / 2.0)
}

/// Total quote value resting within `band_percent` of mid across both sides.
///
/// Returns `None` if either side is empty, `Some(0.0)` if nothing falls in range.
pub fn depth_at_band(book: &OrderBook, band_percent: f64) -> Option<f64> {
    let mid = mid_price(book)?;
    let lower = mid * (1.0 - band_percent / 100.0);
    let upper = mid * (1.0 + band_percent / 100.0);

    let bid_depth: f64 = book
        .bids
        .iter()
        .filter(|l| l.price >= lower)
        .map(PriceLevel::quote_value)
        .sum();
    let ask_depth: f64 = book
        .asks
        .iter()
        .filter(|l| l.price <= upper)
        .map(PriceLevel::quote_value)
        .sum();

    Some(bid_depth + ask_depth)
}

/// Size-weighted average distance from mid of the `level_count` levels
/// nearest the touch on each side, as a percent of mid.
///
/// Returns `None` if either side is empty or the sampled size is zero.
pub fn dollar_weighted_spread(book: &OrderBook, level_count: usize) -> Option<f64> {
    let mid = mid_price(book)?;
    if mid <= 0.0 {
        return None;
    }

    let mut asks: Vec<&PriceLevel> = book.asks.iter().collect();
    asks.sort_by(|a, b| a.price.total_cmp(&b.price));
    let mut bids: Vec<&PriceLevel> = book.bids.iter().collect();
    bids.sort_by(|a, b| b.price.total_cmp(&a.price));

    let near_touch = asks
        .into_iter()
        .take(level_count)
        .chain(bids.into_iter().take(level_count));

    let (weighted, total_size) = near_touch.fold((0.0, 0.0), |(w, s), level| {
        (w + level.amount * (level.price - mid).abs(), s + level.amount)
    });

    if total_size <= 0.0 {
        return None;
    }

    Some(weighted / total_size / mid * 100.0)
}

/// One-sided liquidity inside a band around mid
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct SideVolume {
    /// Bid quote value in `[lower, mid]`
    pub bid_volume: f64,
    /// Ask quote value in `[mid, upper]`
    pub ask_volume: f64,
    pub bid_orders: usize,
    pub ask_orders: usize,
}

impl SideVolume {
    pub fn total(&self) -> f64 {
        self.bid_volume + self.ask_volume
    }

    /// Bid/ask volume ratio, 0 when there is no ask volume
    pub fn imbalance(&self) -> f64 {
        if self.ask_volume > 0.0 {
            self.bid_volume / self.ask_volume
        } else {
            0.0
        }
    }
}

/// Per-side volume and order count within `band_percent` of mid
pub fn side_volume_within(book: &OrderBook, band_percent: f64) -> Option<SideVolume> {
    let mid = mid_price(book)?;
    let lower = mid * (1.0 - band_percent / 100.0);
    let upper = mid * (1.0 + band_percent / 100.0);

    let bids: Vec<&PriceLevel> = book
        .bids
        .iter()
        .filter(|l| l.price >= lower && l.price <= mid)
        .collect();
    let asks: Vec<&PriceLevel> = book
        .asks
        .iter()
        .filter(|l| l.price >= mid && l.price <= upper)
        .collect();

    Some(SideVolume {
        bid_volume: bids.iter().map(|l| l.quote_value()).sum(),
        ask_volume: asks.iter().map(|l| l.quote_value()).sum(),
        bid_orders: bids.len(),
        ask_orders: asks.len(),
    })
}

/// Depth reading for one band
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BandDepth {
    pub band_percent: f64,
    pub depth: Option<f64>,
}

/// All derived metrics for one sample
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BookMetrics {
    pub mid_price: Option<f64>,
    pub depths: Vec<BandDepth>,
    pub dws: Option<f64>,
    pub volume: Option<SideVolume>,
}

impl BookMetrics {
    pub fn compute(book: &OrderBook, config: &MetricsConfig) -> Self {
        Self {
            mid_price: mid_price(book),
            depths: config
                .depth_bands
                .iter()
                .map(|&band| BandDepth {
                    band_percent: band,
                    depth: depth_at_band(book, band),
                })
                .collect(),
            dws: dollar_weighted_spread(book, config.dws_levels),
            volume: side_volume_within(book, config.volume_band),
        }
    }

    /// Depth for a configured band
    pub fn depth_at(&self, band_percent: f64) -> Option<f64> {
        self.depths
            .iter()
            .find(|d| (d.band_percent - band_percent).abs() < f64::EPSILON)
            .and_then(|d| d.depth)
    }

    /// Depth by position in the configured band list
    pub fn depth_nth(&self, index: usize) -> Option<f64> {
        self.depths.get(index).and_then(|d| d.depth)
    }
}

/// Format a quote-currency amount as `$1.20M`, `$10.5K`, `$950` or `--`
pub fn format_depth(value: Option<f64>) -> String {
    match value {
        None => "--".to_string(),
        Some(v) if v >= 1_000_000.0 => format!("${:.2}M", v / 1_000_000.0),
        Some(v) if v >= 1_000.0 => format!("${:.1}K", v / 1_000.0),
        Some(v) => format!("${:.0}", v),
    }
}
