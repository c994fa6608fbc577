//! # Bridge Configuration
//!
//! Configuration for the node bridge and its PoW miner.

use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Default node extension address.
pub const DEFAULT_ADDRESS: &str = "localhost:9029";

/// Minimum interval between two node status updates, in milliseconds.
pub const DEFAULT_STATUS_COOLDOWN_MS: u32 = 1_000;

/// Node bridge configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Address of the node's extension interface (`host:port`).
    pub address: String,

    /// Network the node must run. `None` or empty disables the check.
    pub target_network_name: Option<String>,

    /// Cooldown the node applies between status updates.
    pub status_cooldown_ms: u32,

    /// Interval between checks for an optional node capability.
    pub capability_retry_interval_ms: u64,

    /// Proof-of-work settings.
    pub pow: PowConfig,
}

/// Proof-of-work settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PowConfig {
    /// Number of threads searching for a nonce.
    pub parallelism: usize,

    /// Time spent on one set of parents before they are refreshed.
    pub refresh_tips_interval_secs: u64,

    /// Number of tips requested when refreshing parents.
    pub tips_count: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            target_network_name: None,
            status_cooldown_ms: DEFAULT_STATUS_COOLDOWN_MS,
            capability_retry_interval_ms: 1_000,
            pow: PowConfig::default(),
        }
    }
}

impl Default for PowConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get().max(1),
            refresh_tips_interval_secs: 5,
            tips_count: 8,
        }
    }
}

impl BridgeConfig {
    /// Create a config for testing (short intervals, one PoW thread).
    pub fn for_testing() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            target_network_name: None,
            status_cooldown_ms: 10,
            capability_retry_interval_ms: 10,
            pow: PowConfig {
                parallelism: 1,
                refresh_tips_interval_secs: 1,
                tips_count: 2,
            },
        }
    }

    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset or unparsable.
    ///
    /// # Environment Variables
    ///
    /// - `NODE_BRIDGE_ADDRESS`: Node address (default: localhost:9029)
    /// - `NODE_BRIDGE_TARGET_NETWORK`: Expected network name (default: unchecked)
    /// - `NODE_BRIDGE_STATUS_COOLDOWN_MS`: Status cooldown (default: 1000)
    /// - `NODE_BRIDGE_POW_PARALLELISM`: PoW threads (default: CPU count)
    /// - `NODE_BRIDGE_POW_REFRESH_SECS`: Tip refresh interval (default: 5)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            address: env::var("NODE_BRIDGE_ADDRESS").unwrap_or(defaults.address),
            target_network_name: env::var("NODE_BRIDGE_TARGET_NETWORK")
                .ok()
                .filter(|name| !name.is_empty()),
            status_cooldown_ms: parse_env("NODE_BRIDGE_STATUS_COOLDOWN_MS")
                .unwrap_or(defaults.status_cooldown_ms),
            capability_retry_interval_ms: defaults.capability_retry_interval_ms,
            pow: PowConfig {
                parallelism: parse_env("NODE_BRIDGE_POW_PARALLELISM")
                    .unwrap_or(defaults.pow.parallelism),
                refresh_tips_interval_secs: parse_env("NODE_BRIDGE_POW_REFRESH_SECS")
                    .unwrap_or(defaults.pow.refresh_tips_interval_secs),
                tips_count: defaults.pow.tips_count,
            },
        }
    }

    /// Interval between checks for an optional node capability.
    pub fn capability_retry_interval(&self) -> Duration {
        Duration::from_millis(self.capability_retry_interval_ms)
    }
}

impl PowConfig {
    /// Time spent on one set of parents before they are refreshed.
    pub fn refresh_tips_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_tips_interval_secs)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.address, "localhost:9029");
        assert_eq!(config.status_cooldown_ms, 1_000);
        assert!(config.target_network_name.is_none());
        assert!(config.pow.parallelism >= 1);
        assert_eq!(config.pow.refresh_tips_interval(), Duration::from_secs(5));
    }

    #[test]
    fn test_testing_config() {
        let config = BridgeConfig::for_testing();
        assert_eq!(config.pow.parallelism, 1);
        assert_eq!(config.capability_retry_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_partial_deserialize_uses_defaults() {
        let config: BridgeConfig =
            serde_json::from_str(r#"{"address":"node:9029","pow":{"tips_count":4}}"#)
                .expect("valid config");
        assert_eq!(config.address, "node:9029");
        assert_eq!(config.pow.tips_count, 4);
        assert_eq!(config.pow.refresh_tips_interval_secs, 5);
        assert_eq!(config.status_cooldown_ms, DEFAULT_STATUS_COOLDOWN_MS);
    }
}
