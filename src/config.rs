//! Configuration management
//!
//! Layered: config file, then `SPREAD_MONITOR_*` environment variables
//! (`__` separates nested keys, e.g. `SPREAD_MONITOR_NOTIFY__WEBHOOK_URL`).

use crate::audit::AuditConfig;
use crate::error::{MonitorError, Result};
use crate::health::HealthPolicy;
use crate::notify::NotifyConfig;
use crate::orderbook::MetricsConfig;
use crate::scheduler::RetryPolicy;
use crate::source::SourceConfig;
use crate::types::Instrument;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "SPREAD_MONITOR";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub instruments: Vec<Instrument>,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub health: HealthPolicy,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SamplingConfig {
    /// Upper bound on one snapshot fetch
    pub sample_timeout_secs: u64,
    /// Sleep between cycles
    pub cycle_cooldown_secs: u64,
    /// Live table print interval
    pub table_refresh_secs: u64,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            sample_timeout_secs: 10,
            cycle_cooldown_secs: 2,
            table_refresh_secs: 5,
        }
    }
}

impl SamplingConfig {
    pub fn sample_timeout(&self) -> Duration {
        Duration::from_secs(self.sample_timeout_secs)
    }

    pub fn cycle_cooldown(&self) -> Duration {
        Duration::from_secs(self.cycle_cooldown_secs)
    }

    pub fn table_refresh(&self) -> Duration {
        Duration::from_secs(self.table_refresh_secs.max(1))
    }
}

impl Config {
    /// Load configuration from file
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(environment())
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from default locations
    pub fn load_default() -> anyhow::Result<Self> {
        let paths = [
            "config.toml",
            "config.yaml",
            "~/.config/spread-monitor/config.toml",
        ];

        for path in paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::load(expanded.as_ref());
            }
        }

        anyhow::bail!("No configuration file found")
    }

    /// Parse TOML text, without environment overrides
    pub fn from_toml_str(text: &str) -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Toml))
            .build()?;

        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.instruments.is_empty() {
            return Err(MonitorError::Config("no instruments configured".to_string()));
        }

        let mut seen = HashSet::new();
        for instrument in &self.instruments {
            if instrument.symbol.trim().is_empty() {
                return Err(MonitorError::Config("instrument with empty symbol".to_string()));
            }
            if !seen.insert(instrument.symbol.as_str()) {
                return Err(MonitorError::Config(format!(
                    "duplicate instrument {}",
                    instrument.symbol
                )));
            }
            if !(instrument.target_spread_percent > 0.0) {
                return Err(MonitorError::Config(format!(
                    "target spread for {} must be positive",
                    instrument.symbol
                )));
            }
        }

        if self.retry.poor_lower_pct >= self.retry.poor_upper_pct {
            return Err(MonitorError::Config(
                "retry.poor_lower_pct must be below retry.poor_upper_pct".to_string(),
            ));
        }
        if self.health.alert_threshold_cycles == 0 {
            return Err(MonitorError::Config(
                "health.alert_threshold_cycles must be at least 1".to_string(),
            ));
        }
        if self.sampling.sample_timeout_secs == 0 {
            return Err(MonitorError::Config(
                "sampling.sample_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.metrics.dws_levels == 0 {
            return Err(MonitorError::Config(
                "metrics.dws_levels must be at least 1".to_string(),
            ));
        }
        if self.metrics.depth_bands.iter().any(|b| !(*b > 0.0)) {
            return Err(MonitorError::Config("depth bands must be positive".to_string()));
        }

        Ok(())
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
[[instruments]]
symbol = "BTC_USDT"
target_spread_percent = 0.02

[[instruments]]
symbol = "AAVE_USDT"
target_spread_percent = 0.30
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(MINIMAL).unwrap();

        assert_eq!(config.instruments.len(), 2);
        assert_eq!(config.instruments[1], Instrument::new("AAVE_USDT", 0.30));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.health, HealthPolicy::default());
        assert_eq!(config.sampling.sample_timeout(), Duration::from_secs(10));
        assert_eq!(config.sampling.cycle_cooldown(), Duration::from_secs(2));
        assert_eq!(config.metrics.depth_bands, vec![1.0, 2.0]);
        assert_eq!(config.source, SourceConfig::default());
        assert!(config.notify.webhook_url.is_none());
        assert_eq!(config.audit.file_prefix, "spread_audit");
    }

    #[test]
    fn test_full_config() {
        let text = format!(
            "{}{}",
            MINIMAL,
            r#"
[retry]
max_warn_retries = 2
poor_lower_pct = -50.0

[sampling]
sample_timeout_secs = 20

[health]
alert_threshold_cycles = 4
alert_cooldown_mins = 60

[metrics]
depth_bands = [0.5, 1.0, 2.0]

[source]
kind = "file"
snapshot_dir = "snapshots"

[notify]
webhook_url = "https://hooks.example.com/abc"

[audit]
log_dir = "audit"
"#
        );
        let config = Config::from_toml_str(&text).unwrap();

        assert_eq!(config.retry.max_warn_retries, 2);
        assert_eq!(config.retry.max_fail_retries, 3);
        assert_eq!(config.retry.poor_lower_pct, -50.0);
        assert_eq!(config.sampling.sample_timeout_secs, 20);
        assert_eq!(config.health.alert_threshold_cycles, 4);
        assert_eq!(config.health.persistent_log_interval, 5);
        assert_eq!(config.metrics.depth_bands, vec![0.5, 1.0, 2.0]);
        assert_eq!(
            config.source,
            SourceConfig::File {
                snapshot_dir: "snapshots".into()
            }
        );
        assert_eq!(
            config.notify.webhook_url.as_deref(),
            Some("https://hooks.example.com/abc")
        );
        assert_eq!(config.audit.log_dir, std::path::PathBuf::from("audit"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.instruments[0].symbol, "BTC_USDT");
    }

    #[test]
    fn test_rejects_empty_instruments() {
        assert!(Config::from_toml_str("instruments = []").is_err());
    }

    #[test]
    fn test_rejects_duplicate_symbols() {
        let text = r#"
[[instruments]]
symbol = "BTC_USDT"
target_spread_percent = 0.02

[[instruments]]
symbol = "BTC_USDT"
target_spread_percent = 0.05
"#;
        let err = Config::from_toml_str(text).unwrap_err();
        assert!(err.to_string().contains("duplicate instrument BTC_USDT"));
    }

    #[test]
    fn test_rejects_non_positive_target() {
        let text = r#"
[[instruments]]
symbol = "BTC_USDT"
target_spread_percent = 0.0
"#;
        assert!(Config::from_toml_str(text).is_err());
    }

    #[test]
    fn test_rejects_inverted_band() {
        let text = format!("{}\n[retry]\npoor_upper_pct = -50.0\n", MINIMAL);
        assert!(Config::from_toml_str(&text).is_err());
    }

    #[test]
    fn test_rejects_zero_sample_timeout() {
        let text = format!("{}\n[sampling]\nsample_timeout_secs = 0\n", MINIMAL);
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("sample_timeout_secs"));
    }

    #[test]
    fn test_rejects_zero_dws_levels() {
        let text = format!("{}\n[metrics]\ndws_levels = 0\n", MINIMAL);
        let err = Config::from_toml_str(&text).unwrap_err();
        assert!(err.to_string().contains("dws_levels"));
    }
}
