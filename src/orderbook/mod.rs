//! Order book snapshot model
//!
//! Structured view of one sampled order book page:
//! - Ask and bid price levels
//! - Spread price and spread percentage as rendered by the venue

pub mod metrics;
pub mod parser;

pub use metrics::{BookMetrics, MetricsConfig, SideVolume};
pub use parser::{parse_snapshot, SideCursor};

use serde::Serialize;

/// Side of the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Ask,
    Bid,
}

/// One resting order level
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PriceLevel {
    /// Price in quote currency (> 0)
    pub price: f64,
    /// Quantity in base currency (>= 0)
    pub amount: f64,
}

impl PriceLevel {
    pub fn new(price: f64, amount: f64) -> Self {
        Self { price, amount }
    }

    /// Value of the level in quote currency
    pub fn quote_value(&self) -> f64 {
        self.price * self.amount
    }
}

/// Parsed order book sample
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderBook {
    /// Ask levels, sorted by price descending (feed order)
    pub asks: Vec<PriceLevel>,
    /// Bid levels, sorted by price descending
    pub bids: Vec<PriceLevel>,
    pub spread_price: Option<f64>,
    pub spread_percent: Option<f64>,
}

impl OrderBook {
    /// Lowest ask price
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.iter().map(|l| l.price).reduce(f64::min)
    }

    /// Highest bid price
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.iter().map(|l| l.price).reduce(f64::max)
    }

    pub fn levels(&self, side: BookSide) -> &[PriceLevel] {
        match side {
            BookSide::Ask => &self.asks,
            BookSide::Bid => &self.bids,
        }
    }

    /// A sample without a spread percentage cannot be evaluated
    pub fn is_usable(&self) -> bool {
        self.spread_percent.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.asks.is_empty()
            && self.bids.is_empty()
            && self.spread_price.is_none()
            && self.spread_percent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_best_prices_ignore_feed_order() {
        let book = OrderBook {
            asks: vec![PriceLevel::new(100.5, 2.0), PriceLevel::new(100.2, 3.0)],
            bids: vec![PriceLevel::new(99.8, 1.0), PriceLevel::new(99.5, 4.0)],
            spread_price: Some(0.4),
            spread_percent: Some(0.4),
        };

        assert_eq!(book.best_ask(), Some(100.2));
        assert_eq!(book.best_bid(), Some(99.8));
        assert!(book.is_usable());
    }

    #[test]
    fn test_quote_value_is_computed() {
        let level = PriceLevel::new(100.2, 3.0);
        assert!((level.quote_value() - 300.6).abs() < 1e-9);
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::default();
        assert!(book.is_empty());
        assert!(!book.is_usable());
        assert_eq!(book.best_ask(), None);
        assert_eq!(book.best_bid(), None);
    }
}
