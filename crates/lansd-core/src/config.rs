//! Configuration for the discovery core

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the advertisement manager and the discovery
/// coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Timeout for single-shot discovery when the caller does not supply
    /// one (milliseconds)
    #[serde(default = "default_find_timeout")]
    pub find_timeout_ms: u64,

    /// Capacity of the per-session event channels
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            find_timeout_ms: default_find_timeout(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl DiscoveryConfig {
    /// Returns the default single-shot timeout as a Duration
    pub fn find_timeout(&self) -> Duration {
        Duration::from_millis(self.find_timeout_ms)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.find_timeout_ms == 0 {
            return Err("find_timeout_ms cannot be 0".to_string());
        }

        if self.channel_capacity == 0 {
            return Err("channel_capacity cannot be 0".to_string());
        }

        Ok(())
    }
}

// Default configuration values
fn default_find_timeout() -> u64 {
    10_000
}

fn default_channel_capacity() -> usize {
    64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = DiscoveryConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.find_timeout(), Duration::from_millis(10_000));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let config = DiscoveryConfig {
            find_timeout_ms: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = DiscoveryConfig {
            channel_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
