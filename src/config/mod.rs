//! # Window Configuration
//!
//! Validated configuration for the batch window engine. Both triggers are
//! required and must be positive; the queue and report bounds have defaults.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use batch_window::config::{ConfigLoader, WindowConfig};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Explicit construction
//! let config = WindowConfig::new(50, Duration::from_secs(5))?;
//!
//! // Or from a TOML file with BATCH_WINDOW__* environment overrides
//! let loaded = ConfigLoader::new().with_file("config/batch-window.toml").load()?;
//! assert!(loaded.size_limit > 0);
//! # let _ = config;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_REPORT_CAPACITY};

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigLoader;

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_report_capacity() -> usize {
    DEFAULT_REPORT_CAPACITY
}

/// Trigger thresholds and queue bounds shared by every partition worker
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Maximum buffered messages per batch (size trigger)
    pub size_limit: usize,

    /// Maximum buffering duration per batch in milliseconds (time trigger)
    pub time_limit_ms: u64,

    /// Bound of each partition's inbound queue
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Flush reports retained for lagging subscribers
    #[serde(default = "default_report_capacity")]
    pub report_capacity: usize,
}

impl WindowConfig {
    /// Build a validated configuration with default queue bounds
    pub fn new(size_limit: usize, time_limit: Duration) -> ConfigResult<Self> {
        let time_limit_ms = u64::try_from(time_limit.as_millis()).map_err(|_| {
            ConfigurationError::invalid_value(
                "time_limit_ms",
                format!("{time_limit:?}"),
                "duration does not fit in u64 milliseconds",
            )
        })?;

        let config = Self {
            size_limit,
            time_limit_ms,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            report_capacity: DEFAULT_REPORT_CAPACITY,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity;
        self
    }

    pub fn time_limit(&self) -> Duration {
        Duration::from_millis(self.time_limit_ms)
    }

    /// Validate configuration for consistency and required fields
    pub fn validate(&self) -> ConfigResult<()> {
        if self.size_limit == 0 {
            return Err(ConfigurationError::invalid_value(
                "size_limit",
                "0",
                "size limit must be greater than 0",
            ));
        }

        if self.time_limit_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "time_limit_ms",
                "0",
                "time limit must be greater than 0",
            ));
        }

        if self.channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        if self.report_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "report_capacity",
                "0",
                "report capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_applies_defaults() {
        let config = WindowConfig::new(3, Duration::from_secs(5)).unwrap();

        assert_eq!(config.size_limit, 3);
        assert_eq!(config.time_limit(), Duration::from_secs(5));
        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.report_capacity, DEFAULT_REPORT_CAPACITY);
    }

    #[test]
    fn test_zero_limits_rejected() {
        let err = WindowConfig::new(0, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { ref field, .. } if field == "size_limit"));

        let err = WindowConfig::new(10, Duration::ZERO).unwrap_err();
        assert!(matches!(err, ConfigurationError::InvalidValue { ref field, .. } if field == "time_limit_ms"));
    }

    #[test]
    fn test_sub_millisecond_time_limit_rejected() {
        assert!(WindowConfig::new(10, Duration::from_micros(500)).is_err());
    }

    #[test]
    fn test_zero_channel_capacity_rejected() {
        let config = WindowConfig::new(10, Duration::from_secs(1))
            .unwrap()
            .with_channel_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_uses_defaults_for_optional_fields() {
        let config: WindowConfig =
            serde_json::from_str(r#"{"size_limit": 50, "time_limit_ms": 5000}"#).unwrap();

        assert_eq!(config.channel_capacity, DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(config.time_limit(), Duration::from_secs(5));
    }

    #[test]
    fn test_deserialize_requires_both_limits() {
        let result: Result<WindowConfig, _> = serde_json::from_str(r#"{"size_limit": 50}"#);
        assert!(result.is_err());
    }
}
