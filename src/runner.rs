//! Monitoring run loop
//!
//! Cycle after cycle: run the scheduler, fold verdicts into health state,
//! carry tracking items forward, sleep the cooldown. The cancellation token
//! is honoured between instruments, between passes and between cycles.

use crate::audit::AuditSink;
use crate::config::Config;
use crate::error::{MonitorError, Result};
use crate::health::HealthTracker;
use crate::monitor::MonitorState;
use crate::notify::AlertNotifier;
use crate::scheduler::{CycleReport, InstrumentOutcome, RetryScheduler, TrackingItem};
use crate::source::SnapshotSource;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub struct Monitor {
    scheduler: RetryScheduler,
    health: HealthTracker,
    items: Vec<TrackingItem>,
    cycle: u64,
    cycle_cooldown: Duration,
}

impl Monitor {
    pub fn new(
        config: &Config,
        source: Arc<dyn SnapshotSource>,
        sink: Arc<dyn AuditSink>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        let state = MonitorState::new(&config.instruments);
        let scheduler = RetryScheduler::new(
            source,
            config.retry.clone(),
            config.metrics.clone(),
            config.sampling.sample_timeout(),
            state,
        );
        let health = HealthTracker::new(&config.instruments, config.health.clone(), sink, notifier);
        let items = config
            .instruments
            .iter()
            .cloned()
            .map(TrackingItem::new)
            .collect();

        Self {
            scheduler,
            health,
            items,
            cycle: 0,
            cycle_cooldown: config.sampling.cycle_cooldown(),
        }
    }

    /// Shared live table
    pub fn state(&self) -> MonitorState {
        self.scheduler.state().clone()
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn items(&self) -> &[TrackingItem] {
        &self.items
    }

    /// Cycles started so far
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Run a single cycle and fold it into health state
    pub async fn run_once(&mut self, cancel: &CancellationToken) -> Result<CycleReport> {
        self.cycle += 1;
        let cycle = self.cycle;
        info!(
            "[Monitor] Starting cycle {} ({} instruments)",
            cycle,
            self.items.len()
        );

        let report = self
            .scheduler
            .run_cycle(cycle, self.items.clone(), cancel)
            .await?;

        self.health.on_cycle_complete(&report, Utc::now()).await;
        self.items = report
            .outcomes
            .iter()
            .map(InstrumentOutcome::next_item)
            .collect();

        info!(
            "[Monitor] Cycle {} completed in {:.1}s",
            cycle,
            report.duration().num_milliseconds() as f64 / 1000.0
        );
        Ok(report)
    }

    /// Run until cancelled, a fatal error, or `max_cycles` cycles
    pub async fn run(&mut self, cancel: &CancellationToken, max_cycles: Option<u64>) -> Result<()> {
        loop {
            if cancel.is_cancelled() {
                info!("[Monitor] Stop requested");
                return Ok(());
            }

            match self.run_once(cancel).await {
                Ok(_) => {}
                Err(MonitorError::Cancelled) => {
                    info!("[Monitor] Stop requested during cycle {}", self.cycle);
                    return Ok(());
                }
                Err(e) => {
                    error!("[Monitor] Monitoring stopped: {}", e);
                    return Err(e);
                }
            }

            if max_cycles.is_some_and(|max| self.cycle >= max) {
                info!("[Monitor] Completed {} cycle(s)", self.cycle);
                return Ok(());
            }

            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[Monitor] Stop requested during cooldown");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.cycle_cooldown) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AuditEvent, EventType};
    use crate::notify::WebhookNotifier;
    use crate::source::mock::{snapshot_text, ScriptedResponse, ScriptedSource};
    use crate::types::{Status, Verdict};
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    #[async_trait]
    impl AuditSink for RecordingSink {
        async fn append(&self, event: &AuditEvent) -> Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    fn config() -> Config {
        Config::from_toml_str(
            r#"
[[instruments]]
symbol = "BTC_USDT"
target_spread_percent = 0.30

[[instruments]]
symbol = "AAVE_USDT"
target_spread_percent = 0.30
"#,
        )
        .unwrap()
    }

    fn monitor(source: Arc<ScriptedSource>, sink: Arc<RecordingSink>) -> Monitor {
        Monitor::new(
            &config(),
            source,
            sink,
            Arc::new(WebhookNotifier::disabled()),
        )
    }

    fn steady_source() -> ScriptedSource {
        ScriptedSource::new()
            .with_fallback("BTC_USDT", ScriptedResponse::Snapshot(snapshot_text(100.0, 0.32)))
            .with_fallback("AAVE_USDT", ScriptedResponse::Snapshot(snapshot_text(100.0, 0.70)))
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_fixed_cycles() {
        let source = Arc::new(steady_source());
        let sink = Arc::new(RecordingSink::default());
        let mut monitor = monitor(source.clone(), sink.clone());

        monitor.run(&CancellationToken::new(), Some(3)).await.unwrap();

        assert_eq!(monitor.cycle(), 3);
        // AAVE: four samples to confirm, then one per cycle once in warning
        assert_eq!(source.call_count("AAVE_USDT"), 6);
        assert_eq!(source.call_count("BTC_USDT"), 3);

        let health = monitor.health().state("AAVE_USDT").unwrap();
        assert_eq!(health.current_status, Status::Warning);
        assert_eq!(health.consecutive_warning_cycles, 3);
        assert_eq!(
            monitor.health().state("BTC_USDT").unwrap().current_status,
            Status::Okay
        );

        let events: Vec<EventType> = sink.events.lock().iter().map(|e| e.event_type).collect();
        assert_eq!(events, vec![EventType::WarningEntered]);

        let row = monitor.state().row("AAVE_USDT").unwrap();
        assert_eq!(row.status.to_string(), "Warning");
    }

    #[tokio::test]
    async fn test_run_once_carries_items_forward() {
        let source = Arc::new(steady_source());
        let mut monitor = monitor(source, Arc::new(RecordingSink::default()));

        let report = monitor.run_once(&CancellationToken::new()).await.unwrap();
        assert_eq!(report.outcome("AAVE_USDT").unwrap().verdict, Verdict::Warning);

        let items = monitor.items();
        assert_eq!(items[0].instrument.symbol, "BTC_USDT");
        assert_eq!(items[0].previous_cycle_status, Status::Okay);
        assert_eq!(items[1].previous_cycle_status, Status::Warning);
        assert_eq!(items[1].warn_retry_count, 3);
    }

    #[tokio::test]
    async fn test_fatal_source_error_ends_run() {
        let source = Arc::new(
            ScriptedSource::new()
                .with_fallback("BTC_USDT", ScriptedResponse::Unavailable("browser closed".to_string())),
        );
        let mut monitor = monitor(source, Arc::new(RecordingSink::default()));

        let err = monitor.run(&CancellationToken::new(), None).await.unwrap_err();
        assert!(matches!(err, MonitorError::SourceUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let source = Arc::new(steady_source());
        let mut monitor = monitor(source.clone(), Arc::new(RecordingSink::default()));

        let cancel = CancellationToken::new();
        cancel.cancel();
        monitor.run(&cancel, None).await.unwrap();

        assert_eq!(monitor.cycle(), 0);
        assert!(source.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_unbounded_run() {
        let source = Arc::new(steady_source());
        let mut monitor = monitor(source, Arc::new(RecordingSink::default()));

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            stopper.cancel();
        });

        monitor.run(&cancel, None).await.unwrap();
        assert!(monitor.cycle() >= 1);
    }
}
