//! Snapshot text parser
//!
//! The venue renders its depth widget as plain text, asks first, then a
//! `Spread` marker, then bids. Rows are classified by token count:
//! - 1 token: spread price
//! - 2 tokens: spread percentage, e.g. `≈100.00 (+0.40%)`
//! - 3 tokens: price / amount / total
//!
//! Parsing never fails; missing pieces are left as `None` and the caller
//! decides whether the sample is usable.

use super::{BookSide, OrderBook, PriceLevel};

/// Line fragment that separates asks from bids
pub const SPREAD_MARKER: &str = "Spread";

/// Placeholder the venue shows for unknown amounts
pub const PLACEHOLDER: &str = "--";

/// Two-state cursor tracking which side of the book rows belong to.
///
/// Starts on the ask side and moves to the bid side on the first marker line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SideCursor {
    side: BookSide,
}

impl Default for SideCursor {
    fn default() -> Self {
        Self::new()
    }
}

impl SideCursor {
    pub fn new() -> Self {
        Self {
            side: BookSide::Ask,
        }
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    /// Transition condition: the line carries the spread marker
    pub fn is_marker(line: &str) -> bool {
        line.contains(SPREAD_MARKER)
    }

    /// Feed a line through the cursor. Returns `true` when the line is a
    /// marker line, which is never a data row.
    pub fn advance(&mut self, line: &str) -> bool {
        if Self::is_marker(line) {
            self.side = BookSide::Bid;
            true
        } else {
            false
        }
    }
}

/// Decode a numeric token with optional `K`/`M` suffix and thousands separators.
///
/// Returns `None` for placeholders and anything unparseable.
pub fn parse_number(token: &str) -> Option<f64> {
    let token = token.trim();
    if token.is_empty() || token.contains(PLACEHOLDER) {
        return None;
    }

    let (digits, multiplier) = if let Some(rest) = token.strip_suffix('K') {
        (rest, 1_000.0)
    } else if let Some(rest) = token.strip_suffix('M') {
        (rest, 1_000_000.0)
    } else {
        (token, 1.0)
    };

    let value: f64 = digits.replace(',', "").parse().ok()?;
    let value = value * multiplier;
    value.is_finite().then_some(value)
}

/// Parse a price column. Prices carry no suffix and must be positive.
fn parse_price(token: &str) -> Option<f64> {
    if token.contains(PLACEHOLDER) {
        return None;
    }
    let price: f64 = token.replace(',', "").parse().ok()?;
    (price.is_finite() && price > 0.0).then_some(price)
}

/// Parse a spread percentage token such as `(+0.40%)`.
fn parse_percent(token: &str) -> Option<f64> {
    let cleaned: String = token
        .chars()
        .filter(|c| !matches!(c, '(' | ')' | '%' | '+'))
        .collect();
    let value: f64 = cleaned.replace(',', "").parse().ok()?;
    value.is_finite().then_some(value)
}

fn parse_row(tokens: &[&str]) -> Option<PriceLevel> {
    let price = parse_price(tokens[0])?;
    let amount = parse_number(tokens[1])?;
    // Total is only checked for presence; quote value is recomputed.
    parse_number(tokens[2])?;

    if amount < 0.0 {
        return None;
    }
    Some(PriceLevel::new(price, amount))
}

/// Parse raw snapshot text into an order book
pub fn parse_snapshot(raw: &str) -> OrderBook {
    let mut book = OrderBook::default();
    let mut cursor = SideCursor::new();

    for line in raw.lines() {
        if cursor.advance(line) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.len() {
            1 => {
                if let Some(price) = parse_price(tokens[0]) {
                    book.spread_price = Some(price);
                }
            }
            2 => {
                if let Some(pct) = parse_percent(tokens[1]) {
                    book.spread_percent = Some(pct);
                }
            }
            3 => {
                if let Some(level) = parse_row(&tokens) {
                    match cursor.side() {
                        BookSide::Ask => book.asks.push(level),
                        BookSide::Bid => book.bids.push(level),
                    }
                }
            }
            _ => {}
        }
    }

    sort_descending(&mut book.asks);
    sort_descending(&mut book.bids);
    book
}

fn sort_descending(levels: &mut [PriceLevel]) {
    levels.sort_by(|a, b| b.price.total_cmp(&a.price));
}
