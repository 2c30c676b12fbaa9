//! Scripted snapshot source
//!
//! In-memory source for tests and dry runs:
//! - Per-symbol queue of scripted responses
//! - Optional fallback snapshot once a queue is drained
//! - Call log for asserting sampling order

use super::SnapshotSource;
use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// One scripted reply
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptedResponse {
    /// Return this snapshot text
    Snapshot(String),
    /// Fail this sample
    Fail(String),
    /// Connection refused for this sample
    Refused(String),
    /// Never answer (exercises the sample timeout)
    Hang,
    /// Report the whole source as unusable
    Unavailable(String),
}

#[derive(Default)]
pub struct ScriptedSource {
    scripts: Mutex<HashMap<String, VecDeque<ScriptedResponse>>>,
    fallback: Mutex<HashMap<String, ScriptedResponse>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue responses for a symbol, consumed in order
    pub fn with_script(self, symbol: &str, responses: Vec<ScriptedResponse>) -> Self {
        self.push_script(symbol, responses);
        self
    }

    /// Response used for a symbol once its script is drained
    pub fn with_fallback(self, symbol: &str, response: ScriptedResponse) -> Self {
        self.fallback.lock().insert(symbol.to_string(), response);
        self
    }

    pub fn push_script(&self, symbol: &str, responses: Vec<ScriptedResponse>) {
        self.scripts
            .lock()
            .entry(symbol.to_string())
            .or_default()
            .extend(responses);
    }

    /// Symbols in the order they were sampled
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self, symbol: &str) -> usize {
        self.calls.lock().iter().filter(|s| s.as_str() == symbol).count()
    }

    fn next_response(&self, symbol: &str) -> Option<ScriptedResponse> {
        let scripted = self
            .scripts
            .lock()
            .get_mut(symbol)
            .and_then(|queue| queue.pop_front());
        scripted.or_else(|| self.fallback.lock().get(symbol).cloned())
    }
}

#[async_trait]
impl SnapshotSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<String> {
        self.calls.lock().push(symbol.to_string());

        match self.next_response(symbol) {
            Some(ScriptedResponse::Snapshot(text)) => Ok(text),
            Some(ScriptedResponse::Fail(reason)) => Err(MonitorError::Sample {
                symbol: symbol.to_string(),
                reason,
            }),
            Some(ScriptedResponse::Refused(reason)) => Err(MonitorError::Unreachable {
                symbol: symbol.to_string(),
                reason,
            }),
            Some(ScriptedResponse::Hang) => std::future::pending().await,
            Some(ScriptedResponse::Unavailable(reason)) => {
                Err(MonitorError::SourceUnavailable(reason))
            }
            None => Err(MonitorError::Sample {
                symbol: symbol.to_string(),
                reason: "no scripted snapshot".to_string(),
            }),
        }
    }
}

/// Build a minimal snapshot around `mid` with the given spread percentage
pub fn snapshot_text(mid: f64, spread_percent: f64) -> String {
    let half = mid * spread_percent / 200.0;
    let ask = mid + half;
    let bid = mid - half;
    format!(
        "Price Amount Total\n{:.4} 5 {:.4}\n{:.4} 3 {:.4}\nSpread\n{:.4}\n≈{:.4} (+{}%)\n{:.4} 3 {:.4}\n{:.4} 5 {:.4}\n",
        ask * 1.001,
        ask * 1.001 * 5.0,
        ask,
        ask * 3.0,
        ask - bid,
        mid,
        spread_percent,
        bid,
        bid * 3.0,
        bid * 0.999,
        bid * 0.999 * 5.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::parse_snapshot;

    #[tokio::test]
    async fn test_scripted_responses_in_order() {
        let source = ScriptedSource::new().with_script(
            "BTC_USDT",
            vec![
                ScriptedResponse::Fail("navigation".to_string()),
                ScriptedResponse::Snapshot("ok".to_string()),
            ],
        );

        assert!(source.fetch_snapshot("BTC_USDT").await.is_err());
        assert_eq!(source.fetch_snapshot("BTC_USDT").await.unwrap(), "ok");
        assert!(source.fetch_snapshot("BTC_USDT").await.is_err());
        assert_eq!(source.call_count("BTC_USDT"), 3);
    }

    #[tokio::test]
    async fn test_fallback_after_script() {
        let source = ScriptedSource::new()
            .with_script("ETH_USDT", vec![ScriptedResponse::Snapshot("first".to_string())])
            .with_fallback("ETH_USDT", ScriptedResponse::Snapshot("steady".to_string()));

        assert_eq!(source.fetch_snapshot("ETH_USDT").await.unwrap(), "first");
        assert_eq!(source.fetch_snapshot("ETH_USDT").await.unwrap(), "steady");
        assert_eq!(source.fetch_snapshot("ETH_USDT").await.unwrap(), "steady");
    }

    #[tokio::test]
    async fn test_unavailable_is_fatal() {
        let source = ScriptedSource::new()
            .with_script("X", vec![ScriptedResponse::Unavailable("browser gone".to_string())]);
        let err = source.fetch_snapshot("X").await.unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_snapshot_text_parses() {
        let book = parse_snapshot(&snapshot_text(100.0, 0.7));
        assert_eq!(book.spread_percent, Some(0.7));
        assert_eq!(book.asks.len(), 2);
        assert_eq!(book.bids.len(), 2);
        assert!(book.best_ask().unwrap() > book.best_bid().unwrap());
    }
}
