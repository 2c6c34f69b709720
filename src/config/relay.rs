//! Outbox relay configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Outbox relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// How often to poll for unpublished entries
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Maximum entries claimed per poll cycle
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// First back-off delay after a publish failure
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Ceiling for the exponential back-off
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,

    /// Published entries older than this are pruned
    #[serde(default = "default_retention")]
    pub retention_hours: u32,

    /// How often the pruning pass runs
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl RelayConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }

    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.retention_hours))
    }

    /// Validate relay configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.batch_size == 0 {
            return Err(ValidationError::InvalidBatchSize);
        }
        if self.poll_interval_ms == 0 {
            return Err(ValidationError::InvalidTimeout("poll_interval_ms"));
        }
        if self.max_backoff() < self.initial_backoff() {
            return Err(ValidationError::InvalidBackoff);
        }
        Ok(())
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            batch_size: default_batch_size(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_secs: default_max_backoff(),
            retention_hours: default_retention(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

fn default_poll_interval() -> u64 {
    500
}

fn default_batch_size() -> u32 {
    100
}

fn default_initial_backoff() -> u64 {
    500
}

fn default_max_backoff() -> u64 {
    30
}

fn default_retention() -> u32 {
    72
}

fn default_prune_interval() -> u64 {
    3600
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = RelayConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.retention(), chrono::Duration::hours(72));
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = RelayConfig {
            batch_size: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBatchSize)
        ));
    }

    #[test]
    fn backoff_ceiling_below_floor_is_rejected() {
        let config = RelayConfig {
            initial_backoff_ms: 60_000,
            max_backoff_secs: 1,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBackoff)
        ));
    }
}
