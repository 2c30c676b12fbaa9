//! Tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::MonitorError;

    #[test]
    fn test_sample_timeout_error() {
        let err = MonitorError::SampleTimeout {
            symbol: "BTC_USDT".to_string(),
            timeout_ms: 10_000,
        };
        assert!(err.to_string().contains("timed out"));
        assert!(err.to_string().contains("BTC_USDT"));
        assert!(err.to_string().contains("10000ms"));
    }

    #[test]
    fn test_sample_error() {
        let err = MonitorError::Sample {
            symbol: "ETH_USDT".to_string(),
            reason: "HTTP 502".to_string(),
        };
        assert!(err.to_string().contains("Sample failed for ETH_USDT"));
        assert!(err.to_string().contains("HTTP 502"));
    }

    #[test]
    fn test_parse_ambiguity_error() {
        let err = MonitorError::ParseAmbiguity("no spread percentage".to_string());
        assert!(err.to_string().contains("Snapshot parse error"));
    }

    #[test]
    fn test_unreachable_is_retried_not_fatal() {
        let err = MonitorError::Unreachable {
            symbol: "BTC_USDT".to_string(),
            reason: "connection refused".to_string(),
        };
        assert!(err.is_unreachable());
        assert!(err.is_sample_failure());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("Cannot reach data source for BTC_USDT"));
    }

    #[test]
    fn test_source_unavailable_is_fatal() {
        let err = MonitorError::SourceUnavailable("renderer down".to_string());
        assert!(err.is_fatal());
        assert!(!err.is_sample_failure());
        assert!(err.to_string().contains("Data source unavailable"));
    }

    #[test]
    fn test_sample_failures_are_not_fatal() {
        let errors = vec![
            MonitorError::SampleTimeout {
                symbol: "X".to_string(),
                timeout_ms: 1,
            },
            MonitorError::Sample {
                symbol: "X".to_string(),
                reason: "navigation".to_string(),
            },
            MonitorError::ParseAmbiguity("empty".to_string()),
        ];

        for err in errors {
            assert!(err.is_sample_failure(), "{} should be retried", err);
            assert!(!err.is_fatal());
        }
    }

    #[test]
    fn test_notifier_error_not_fatal() {
        let err = MonitorError::Notifier("webhook returned 500".to_string());
        assert!(!err.is_fatal());
        assert!(!err.is_sample_failure());
    }

    #[test]
    fn test_config_error() {
        let err = MonitorError::Config("no instruments".to_string());
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: MonitorError = io.into();
        assert!(matches!(err, MonitorError::Io(_)));
    }

    #[test]
    fn test_cancelled_display() {
        assert_eq!(MonitorError::Cancelled.to_string(), "Monitoring cancelled");
    }
}
