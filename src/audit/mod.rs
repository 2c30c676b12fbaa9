//! Audit trail of health transitions
//!
//! Append-only, one record per event, one CSV file per UTC day.

use crate::error::{MonitorError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    WarningEntered,
    WarningCleared,
    WarningPersistent,
    ScrapeFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::WarningEntered => "WARNING_ENTERED",
            Self::WarningCleared => "WARNING_CLEARED",
            Self::WarningPersistent => "WARNING_PERSISTENT",
            Self::ScrapeFailed => "SCRAPE_FAILED",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One audit record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub symbol: String,
    pub event_type: EventType,
    pub current_spread: Option<f64>,
    pub target_spread: f64,
    pub percent_diff: Option<f64>,
    pub dws: Option<f64>,
    pub depth_at_band1: Option<f64>,
    pub depth_at_band2: Option<f64>,
    pub duration_cycles: u32,
    pub notes: String,
}

/// Audit log collaborator
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, event: &AuditEvent) -> Result<()>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub log_dir: PathBuf,
    pub file_prefix: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            file_prefix: "spread_audit".to_string(),
        }
    }
}

struct DailyFile {
    date: NaiveDate,
    writer: csv::Writer<File>,
}

/// CSV audit log, rotated by event date
pub struct CsvAuditLog {
    dir: PathBuf,
    prefix: String,
    current: Mutex<Option<DailyFile>>,
}

impl CsvAuditLog {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            current: Mutex::new(None),
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.log_dir.clone(), config.file_prefix.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File holding the events of one day
    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}_{}.csv", self.prefix, date.format("%Y-%m-%d")))
    }

    fn open(&self, date: NaiveDate) -> Result<DailyFile> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(date);

        let needs_header = match std::fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let writer = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        info!("[Audit] Writing events to {}", path.display());
        Ok(DailyFile { date, writer })
    }
}

#[async_trait]
impl AuditSink for CsvAuditLog {
    async fn append(&self, event: &AuditEvent) -> Result<()> {
        let date = event.timestamp.date_naive();
        let mut current = self.current.lock();

        if current.as_ref().map(|f| f.date) != Some(date) {
            *current = Some(self.open(date)?);
        }

        let file = current
            .as_mut()
            .ok_or_else(|| MonitorError::Audit("no open audit file".to_string()))?;
        file.writer.serialize(event)?;
        file.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(timestamp: DateTime<Utc>, event_type: EventType, notes: &str) -> AuditEvent {
        AuditEvent {
            timestamp,
            symbol: "BTC_USDT".to_string(),
            event_type,
            current_spread: Some(0.7),
            target_spread: 0.3,
            percent_diff: Some(133.33),
            dws: None,
            depth_at_band1: Some(999.4),
            depth_at_band2: Some(1500.0),
            duration_cycles: 1,
            notes: notes.to_string(),
        }
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_event_type_names() {
        assert_eq!(EventType::WarningEntered.to_string(), "WARNING_ENTERED");
        assert_eq!(EventType::ScrapeFailed.as_str(), "SCRAPE_FAILED");
        assert_eq!(
            serde_json::to_string(&EventType::WarningPersistent).unwrap(),
            "\"WARNING_PERSISTENT\""
        );
    }

    #[tokio::test]
    async fn test_csv_log_writes_header_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvAuditLog::new(dir.path(), "audit");
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();

        log.append(&event(ts, EventType::WarningEntered, "spread above target")).await.unwrap();
        log.append(&event(ts, EventType::WarningPersistent, "still, bad")).await.unwrap();

        let path = log.path_for(ts.date_naive());
        assert!(path.ends_with("audit_2026-03-14.csv"));

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("timestamp,symbol,event_type,current_spread"));
        assert!(lines[1].contains("WARNING_ENTERED"));
        // Empty field for absent DWS
        assert!(lines[1].contains(",133.33,,999.4,"));
        assert!(lines[2].contains("\"still, bad\""));
    }

    #[tokio::test]
    async fn test_csv_log_rotates_daily() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvAuditLog::new(dir.path(), "audit");
        let day1 = Utc.with_ymd_and_hms(2026, 3, 14, 23, 59, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 15, 0, 1, 0).unwrap();

        log.append(&event(day1, EventType::WarningEntered, "")).await.unwrap();
        log.append(&event(day2, EventType::WarningCleared, "")).await.unwrap();

        assert_eq!(read_lines(&log.path_for(day1.date_naive())).len(), 2);
        assert_eq!(read_lines(&log.path_for(day2.date_naive())).len(), 2);
    }

    #[tokio::test]
    async fn test_csv_log_appends_to_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let ts = Utc.with_ymd_and_hms(2026, 3, 14, 10, 0, 0).unwrap();

        {
            let log = CsvAuditLog::new(dir.path(), "audit");
            log.append(&event(ts, EventType::WarningEntered, "first run")).await.unwrap();
        }

        let log = CsvAuditLog::new(dir.path(), "audit");
        log.append(&event(ts, EventType::WarningCleared, "second run")).await.unwrap();

        let lines = read_lines(&log.path_for(ts.date_naive()));
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines.iter().filter(|l| l.starts_with("timestamp,")).count(),
            1
        );
        assert!(lines[2].contains("second run"));
    }
}
