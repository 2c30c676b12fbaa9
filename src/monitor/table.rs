//! Plain-text rendering of the live table

use super::state::{InstrumentRow, Progress};
use crate::orderbook::metrics::format_depth;

fn opt(value: Option<f64>, decimals: usize) -> String {
    value
        .map(|v| format!("{:.*}", decimals, v))
        .unwrap_or_else(|| "--".to_string())
}

/// Render rows as a fixed-width table with a progress header
pub fn render_table(rows: &[InstrumentRow], progress: &Progress) -> String {
    let mut out = String::new();

    let position = match &progress.symbol {
        Some(symbol) => format!("pass {} - sampling {}", progress.pass, symbol),
        None => "idle".to_string(),
    };
    out.push_str(&format!("Cycle {} ({})\n", progress.cycle, position));
    out.push_str(&format!(
        "{:<14} {:>9} {:>9} {:>9} {:>9} {:>10} {:>10} {:>8} {:<22} {:>8} {:>5}\n",
        "Symbol", "Spread%", "Target%", "Diff", "Diff%", "Depth1", "Depth2", "DWS%", "Status", "Updated", "W/F"
    ));

    for row in rows {
        out.push_str(&format!(
            "{:<14} {:>9} {:>9.4} {:>9} {:>9} {:>10} {:>10} {:>8} {:<22} {:>8} {:>5}\n",
            row.symbol,
            opt(row.current_spread_percent, 4),
            row.target_spread_percent,
            opt(row.difference, 4),
            opt(row.percent_diff, 2),
            format_depth(row.depths.first().and_then(|d| d.depth)),
            format_depth(row.depths.get(1).and_then(|d| d.depth)),
            opt(row.dws, 4),
            row.status.to_string(),
            row.last_updated_label(),
            format!("{}/{}", row.warn_retry_count, row.fail_retry_count),
        ));
    }

    out
}

/// Detail block for rows in a settled warning: band volumes, order counts,
/// imbalance, changes since the previous sample and the short trend
pub fn render_warning_details(rows: &[InstrumentRow]) -> String {
    let mut out = String::new();

    for row in rows {
        out.push_str(&format!("== {} ({}) ==\n", row.symbol, row.status));

        match row.volume {
            Some(volume) => out.push_str(&format!(
                "Near mid: bids {} ({} orders) | asks {} ({} orders) | imbalance {:.2}\n",
                format_depth(Some(volume.bid_volume)),
                volume.bid_orders,
                format_depth(Some(volume.ask_volume)),
                volume.ask_orders,
                volume.imbalance()
            )),
            None => out.push_str("Near mid: --\n"),
        }

        let changes = row.history.changes();
        if row.history.len() >= 2 {
            out.push_str(&format!(
                "Change: spread {:+.2}% | volume {:+.2}% | imbalance {:+.2}%\n",
                changes.spread_change, changes.volume_change, changes.imbalance_change
            ));
        }
        out.push_str(&format!(
            "Trend ({} samples): {}\n",
            row.history.len(),
            changes.trend
        ));
    }

    out
}
