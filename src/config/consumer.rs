//! Consumer supervisor configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Consumer supervisor configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerConfig {
    /// Bounded in-flight budget per partition worker; backpressure
    /// ceiling on downstream pressure
    #[serde(default = "default_in_flight")]
    pub in_flight_per_partition: usize,

    /// Default per-step timeout; rulesets may tighten it per step via
    /// step config
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// Bounded deadline for draining in-flight executions on shutdown
    #[serde(default = "default_drain_timeout")]
    pub drain_timeout_secs: u64,
}

impl ConsumerConfig {
    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_secs(self.drain_timeout_secs)
    }

    /// Validate consumer configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.in_flight_per_partition == 0 {
            return Err(ValidationError::InvalidInFlightBudget);
        }
        if self.step_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("step_timeout_secs"));
        }
        if self.drain_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout("drain_timeout_secs"));
        }
        Ok(())
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            in_flight_per_partition: default_in_flight(),
            step_timeout_secs: default_step_timeout(),
            drain_timeout_secs: default_drain_timeout(),
        }
    }
}

fn default_in_flight() -> usize {
    16
}

fn default_step_timeout() -> u64 {
    60
}

fn default_drain_timeout() -> u64 {
    20
}
