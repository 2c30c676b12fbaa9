//! Alert notification module
//!
//! Delivers warning alerts to an operator webhook. Delivery failures are
//! reported to the caller and never retried here.


use crate::error::{MonitorError, Result};
use crate::orderbook::metrics::{format_depth, BandDepth};
use crate::types::Status;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Notifier collaborator.
///
/// `Ok(true)` means delivered, `Ok(false)` means deliberately not sent
/// (disabled notifier).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn send(&self, message: &str) -> Result<bool>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Webhook endpoint; alerts are disabled when absent
    pub webhook_url: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: None,
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    text: &'a str,
}

/// Posts `{"text": ...}` to a chat webhook
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
    enabled: bool,
}

impl WebhookNotifier {
    pub fn new(url: String, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            url,
            enabled: true,
        })
    }

    /// Create a disabled notifier (for when no webhook is configured)
    pub fn disabled() -> Self {
        Self {
            http: Client::new(),
            url: String::new(),
            enabled: false,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Result<Self> {
        match config.webhook_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => {
                info!("[Notify] Alerts enabled");
                Self::new(url.to_string(), Duration::from_secs(config.request_timeout_secs))
            }
            _ => {
                info!("[Notify] No webhook configured, alerts disabled");
                Ok(Self::disabled())
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn send(&self, message: &str) -> Result<bool> {
        if !self.enabled {
            debug!("[Notify] Disabled, dropping alert");
            return Ok(false);
        }

        let response = self
            .http
            .post(&self.url)
            .json(&WebhookMessage { text: message })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(MonitorError::Notifier(format!(
                "webhook returned {}: {}",
                status, error_text
            )));
        }

        Ok(true)
    }
}

/// Everything an operator needs to judge a warning
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    pub symbol: String,
    pub status: Status,
    pub current_spread: Option<f64>,
    pub target_spread: f64,
    pub percent_diff: Option<f64>,
    pub dws: Option<f64>,
    pub depths: Vec<BandDepth>,
    pub reason: String,
    pub warning_cycles: u32,
    pub elapsed: chrono::Duration,
}

/// Render an alert as plain multi-line text
pub fn format_alert(alert: &AlertMessage) -> String {
    let mut lines = vec![
        format!("⚠️ Spread alert: {}", alert.symbol),
        format!("Status: {}", alert.status),
        format!(
            "Spread: {} (target {:.4}%)",
            alert
                .current_spread
                .map(|s| format!("{:.4}%", s))
                .unwrap_or_else(|| "--".to_string()),
            alert.target_spread
        ),
        format!(
            "Deviation: {}",
            alert
                .percent_diff
                .map(|d| format!("{:+.2}%", d))
                .unwrap_or_else(|| "--".to_string())
        ),
        format!(
            "DWS: {}",
            alert
                .dws
                .map(|d| format!("{:.4}%", d))
                .unwrap_or_else(|| "--".to_string())
        ),
    ];

    for band in &alert.depths {
        lines.push(format!(
            "Depth ±{}%: {}",
            band.band_percent,
            format_depth(band.depth)
        ));
    }

    lines.push(format!("Reason: {}", alert.reason));
    lines.push(format!(
        "Duration: {} cycles, {}",
        alert.warning_cycles,
        format_elapsed(alert.elapsed)
    ));

    lines.join("\n")
}

/// `Hh Mm`, clamped at zero
pub fn format_elapsed(elapsed: chrono::Duration) -> String {
    let minutes = elapsed.num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}
