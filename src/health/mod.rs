//! Cross-cycle health tracking
//!
//! Folds each cycle's verdicts into per-instrument [`HealthState`]:
//! - Warning episodes are opened, counted and cleared
//! - Alerts fire at the threshold and on persistent intervals, gated by cooldown
//! - Every transition is written to the audit sink
//!
//! Audit and notifier failures are logged and never block the cycle.


use crate::audit::{AuditEvent, AuditSink, EventType};
use crate::notify::{format_alert, format_elapsed, AlertMessage, AlertNotifier};
use crate::scheduler::{CycleReport, InstrumentOutcome};
use crate::types::{Instrument, Status, Verdict};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Alerting policy
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct HealthPolicy {
    /// Consecutive warning cycles before the first alert
    pub alert_threshold_cycles: u32,
    /// Minimum time between alerts within one episode
    pub alert_cooldown_mins: i64,
    /// Emit `WARNING_PERSISTENT` every this many warning cycles (0 disables)
    pub persistent_log_interval: u32,
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            alert_threshold_cycles: 3,
            alert_cooldown_mins: 30,
            persistent_log_interval: 5,
        }
    }
}

impl HealthPolicy {
    pub fn alert_cooldown(&self) -> Duration {
        Duration::minutes(self.alert_cooldown_mins)
    }

    fn is_persistent_cycle(&self, count: u32) -> bool {
        self.persistent_log_interval > 0 && count % self.persistent_log_interval == 0
    }

    /// Whether an alert should be attempted at this warning count
    pub fn alert_due(&self, count: u32) -> bool {
        count == self.alert_threshold_cycles
            || (count > self.alert_threshold_cycles && self.is_persistent_cycle(count))
    }
}

/// Per-instrument state, alive for the whole process
#[derive(Debug, Clone, PartialEq)]
pub struct HealthState {
    pub current_status: Status,
    pub previous_status: Status,
    pub consecutive_warning_cycles: u32,
    pub warning_started_at: Option<DateTime<Utc>>,
    pub last_alert_sent_at: Option<DateTime<Utc>>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self {
            current_status: Status::Pending,
            previous_status: Status::Pending,
            consecutive_warning_cycles: 0,
            warning_started_at: None,
            last_alert_sent_at: None,
        }
    }
}

impl HealthState {
    /// An open warning episode. `Failed` cycles leave it open.
    pub fn in_warning_episode(&self) -> bool {
        self.consecutive_warning_cycles > 0
    }

    fn close_episode(&mut self) {
        self.consecutive_warning_cycles = 0;
        self.warning_started_at = None;
        self.last_alert_sent_at = None;
    }
}

/// What happened to an alert attempt
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    NotDue,
    /// Due, but inside the cooldown window
    Suppressed,
    Sent,
    /// Notifier declined (disabled)
    Skipped,
    Failed(String),
}

/// Result of folding one verdict
#[derive(Debug, Clone, PartialEq)]
pub struct HealthUpdate {
    pub symbol: String,
    pub verdict: Verdict,
    pub events: Vec<EventType>,
    pub alert: AlertOutcome,
}

pub struct HealthTracker {
    policy: HealthPolicy,
    states: HashMap<String, HealthState>,
    sink: Arc<dyn AuditSink>,
    notifier: Arc<dyn AlertNotifier>,
}

impl HealthTracker {
    pub fn new(
        instruments: &[Instrument],
        policy: HealthPolicy,
        sink: Arc<dyn AuditSink>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        let states = instruments
            .iter()
            .map(|i| (i.symbol.clone(), HealthState::default()))
            .collect();
        Self {
            policy,
            states,
            sink,
            notifier,
        }
    }

    pub fn policy(&self) -> &HealthPolicy {
        &self.policy
    }

    pub fn state(&self, symbol: &str) -> Option<&HealthState> {
        self.states.get(symbol)
    }

    /// Fold a completed cycle into health state, one instrument at a time
    pub async fn on_cycle_complete(
        &mut self,
        report: &CycleReport,
        now: DateTime<Utc>,
    ) -> Vec<HealthUpdate> {
        let mut updates = Vec::with_capacity(report.outcomes.len());
        for outcome in &report.outcomes {
            updates.push(self.apply(outcome, now).await);
        }
        updates
    }

    async fn apply(&mut self, outcome: &InstrumentOutcome, now: DateTime<Utc>) -> HealthUpdate {
        let symbol = outcome.instrument.symbol.clone();
        let mut state = self.states.get(&symbol).cloned().unwrap_or_default();
        let verdict = outcome.verdict;

        let mut events = Vec::new();
        let mut alert = AlertOutcome::NotDue;

        match verdict {
            Verdict::Failed => {
                warn!(
                    "[Health] {} failed this cycle: {}",
                    symbol,
                    outcome.last_error.as_deref().unwrap_or("unknown error")
                );
                let notes = outcome
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "sample failed".to_string());
                self.emit(outcome, EventType::ScrapeFailed, &state, now, notes)
                    .await;
                events.push(EventType::ScrapeFailed);
            }
            Verdict::Warning => {
                if state.in_warning_episode() {
                    state.consecutive_warning_cycles += 1;
                    debug!(
                        "[Health] {} still in warning ({} cycles)",
                        symbol, state.consecutive_warning_cycles
                    );

                    if self.policy.is_persistent_cycle(state.consecutive_warning_cycles) {
                        let notes = format!(
                            "warning for {} cycles ({})",
                            state.consecutive_warning_cycles,
                            format_elapsed(elapsed_since(state.warning_started_at, now))
                        );
                        self.emit(outcome, EventType::WarningPersistent, &state, now, notes)
                            .await;
                        events.push(EventType::WarningPersistent);
                    }
                } else {
                    state.consecutive_warning_cycles = 1;
                    state.warning_started_at = Some(now);
                    info!("[Health] {} entered warning: {}", symbol, reason(outcome));
                    self.emit(outcome, EventType::WarningEntered, &state, now, reason(outcome))
                        .await;
                    events.push(EventType::WarningEntered);
                }

                if self.policy.alert_due(state.consecutive_warning_cycles) {
                    alert = self.try_alert(outcome, &mut state, now).await;
                }
            }
            Verdict::Okay => {
                if state.in_warning_episode() {
                    let notes = format!(
                        "cleared after {} cycles ({})",
                        state.consecutive_warning_cycles,
                        format_elapsed(elapsed_since(state.warning_started_at, now))
                    );
                    info!("[Health] {} warning {}", symbol, notes);
                    self.emit(outcome, EventType::WarningCleared, &state, now, notes)
                        .await;
                    events.push(EventType::WarningCleared);
                    state.close_episode();
                }
            }
        }

        state.current_status = verdict.into();
        state.previous_status = verdict.into();
        self.states.insert(symbol.clone(), state);

        HealthUpdate {
            symbol,
            verdict,
            events,
            alert,
        }
    }

    async fn try_alert(
        &self,
        outcome: &InstrumentOutcome,
        state: &mut HealthState,
        now: DateTime<Utc>,
    ) -> AlertOutcome {
        let symbol = &outcome.instrument.symbol;

        if let Some(last) = state.last_alert_sent_at {
            if now - last < self.policy.alert_cooldown() {
                debug!("[Health] Alert for {} suppressed by cooldown", symbol);
                return AlertOutcome::Suppressed;
            }
        }

        let message = format_alert(&alert_message(outcome, state, now));
        match self.notifier.send(&message).await {
            Ok(true) => {
                info!(
                    "[Health] Alert sent for {} after {} warning cycles",
                    symbol, state.consecutive_warning_cycles
                );
                state.last_alert_sent_at = Some(now);
                AlertOutcome::Sent
            }
            Ok(false) => AlertOutcome::Skipped,
            Err(e) => {
                error!("[Health] Alert for {} not delivered: {}", symbol, e);
                AlertOutcome::Failed(e.to_string())
            }
        }
    }

    async fn emit(
        &self,
        outcome: &InstrumentOutcome,
        event_type: EventType,
        state: &HealthState,
        now: DateTime<Utc>,
        notes: String,
    ) {
        let event = audit_event(outcome, event_type, state, now, notes);
        if let Err(e) = self.sink.append(&event).await {
            error!(
                "[Health] Failed to write {} for {}: {}",
                event_type, event.symbol, e
            );
        }
    }
}

fn elapsed_since(started: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Duration {
    started.map(|s| now - s).unwrap_or_else(Duration::zero)
}

fn reason(outcome: &InstrumentOutcome) -> String {
    match &outcome.last_sample {
        Some(sample) if sample.reading.percent_diff >= 0.0 => {
            format!("spread {:.1}% above target", sample.reading.percent_diff)
        }
        Some(sample) => format!("spread {:.1}% below target", -sample.reading.percent_diff),
        None => "no usable sample".to_string(),
    }
}

fn audit_event(
    outcome: &InstrumentOutcome,
    event_type: EventType,
    state: &HealthState,
    now: DateTime<Utc>,
    notes: String,
) -> AuditEvent {
    let sample = outcome.last_sample.as_ref();
    AuditEvent {
        timestamp: now,
        symbol: outcome.instrument.symbol.clone(),
        event_type,
        current_spread: sample.map(|s| s.reading.spread_percent),
        target_spread: outcome.instrument.target_spread_percent,
        percent_diff: sample.map(|s| s.reading.percent_diff),
        dws: sample.and_then(|s| s.metrics.dws),
        depth_at_band1: sample.and_then(|s| s.metrics.depth_nth(0)),
        depth_at_band2: sample.and_then(|s| s.metrics.depth_nth(1)),
        duration_cycles: state.consecutive_warning_cycles,
        notes,
    }
}

fn alert_message(
    outcome: &InstrumentOutcome,
    state: &HealthState,
    now: DateTime<Utc>,
) -> AlertMessage {
    let sample = outcome.last_sample.as_ref();
    AlertMessage {
        symbol: outcome.instrument.symbol.clone(),
        status: Status::Warning,
        current_spread: sample.map(|s| s.reading.spread_percent),
        target_spread: outcome.instrument.target_spread_percent,
        percent_diff: sample.map(|s| s.reading.percent_diff),
        dws: sample.and_then(|s| s.metrics.dws),
        depths: sample.map(|s| s.metrics.depths.clone()).unwrap_or_default(),
        reason: reason(outcome),
        warning_cycles: state.consecutive_warning_cycles,
        elapsed: elapsed_since(state.warning_started_at, now),
    }
}
