//! Snapshot data sources
//!
//! A source returns the raw text of one instrument's order book widget.
//! Sources never retry; retry policy lives in the scheduler.

pub mod mock;

use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Data-source collaborator
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    /// Source name
    fn name(&self) -> &str;

    /// Fetch raw snapshot text for a symbol.
    ///
    /// Per-sample problems return a recoverable error, including a refused
    /// connection ([`MonitorError::Unreachable`]); a source that is known to
    /// be unusable as a whole returns [`MonitorError::SourceUnavailable`].
    async fn fetch_snapshot(&self, symbol: &str) -> Result<String>;
}

/// Source configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Text snapshots served over HTTP by a page renderer, at `{base_url}/{symbol}`
    Http {
        base_url: String,
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    /// Saved snapshots at `{snapshot_dir}/{symbol}.txt`
    File { snapshot_dir: PathBuf },
}

fn default_request_timeout_secs() -> u64 {
    15
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self::Http {
            base_url: "http://127.0.0.1:8787/snapshot".to_string(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl SourceConfig {
    pub fn build(&self) -> Result<Arc<dyn SnapshotSource>> {
        let source: Arc<dyn SnapshotSource> = match self {
            Self::Http {
                base_url,
                request_timeout_secs,
            } => Arc::new(HttpSnapshotSource::new(
                base_url.clone(),
                Duration::from_secs(*request_timeout_secs),
            )?),
            Self::File { snapshot_dir } => Arc::new(FileSnapshotSource::new(snapshot_dir.clone())),
        };
        Ok(source)
    }
}

/// Fetches snapshot text from an HTTP page renderer
pub struct HttpSnapshotSource {
    http: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpSnapshotSource {
    pub fn new(base_url: String, request_timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            request_timeout,
        })
    }

    pub fn url_for(&self, symbol: &str) -> String {
        format!("{}/{}", self.base_url, symbol)
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<String> {
        let url = self.url_for(symbol);

        let response = self.http.get(&url).send().await.map_err(|e| {
            if e.is_connect() {
                MonitorError::Unreachable {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }
            } else if e.is_timeout() {
                MonitorError::SampleTimeout {
                    symbol: symbol.to_string(),
                    timeout_ms: self.request_timeout.as_millis() as u64,
                }
            } else {
                MonitorError::Sample {
                    symbol: symbol.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(MonitorError::Sample {
                symbol: symbol.to_string(),
                reason: format!("HTTP {}", status),
            });
        }

        response.text().await.map_err(|e| MonitorError::Sample {
            symbol: symbol.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Reads saved snapshots from a directory, one `<SYMBOL>.txt` per instrument
pub struct FileSnapshotSource {
    dir: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.txt", symbol))
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch_snapshot(&self, symbol: &str) -> Result<String> {
        if !tokio::fs::try_exists(&self.dir).await.unwrap_or(false) {
            return Err(MonitorError::SourceUnavailable(format!(
                "snapshot directory {} does not exist",
                self.dir.display()
            )));
        }

        tokio::fs::read_to_string(self.path_for(symbol))
            .await
            .map_err(|e| MonitorError::Sample {
                symbol: symbol.to_string(),
                reason: e.to_string(),
            })
    }
}
