use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Quiet-period thresholds for one stability wait.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GateConfig {
    /// No DOM mutation for this long counts as DOM-quiet.
    pub dom_quiet_ms: u64,
    /// No request in flight for this long counts as network-quiet.
    pub net_quiet_ms: u64,
    /// Interval between signal polls.
    pub poll_interval_ms: u64,
    /// Hard ceiling on one wait; on expiry the gate gives up and lets the
    /// snapshot proceed.
    pub max_wait_ms: u64,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            dom_quiet_ms: 500,
            net_quiet_ms: 500,
            poll_interval_ms: 100,
            max_wait_ms: 5_000,
        }
    }
}

impl GateConfig {
    /// Tight timings for tests.
    pub fn fast() -> Self {
        Self {
            dom_quiet_ms: 40,
            net_quiet_ms: 40,
            poll_interval_ms: 10,
            max_wait_ms: 300,
        }
    }

    pub fn dom_quiet(&self) -> Duration {
        Duration::from_millis(self.dom_quiet_ms)
    }

    pub fn net_quiet(&self) -> Duration {
        Duration::from_millis(self.net_quiet_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn max_wait(&self) -> Duration {
        Duration::from_millis(self.max_wait_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_contract() {
        let config = GateConfig::default();
        assert_eq!(config.dom_quiet_ms, 500);
        assert_eq!(config.max_wait_ms, 5_000);
        assert!(config.poll_interval() < config.dom_quiet());
    }
}
