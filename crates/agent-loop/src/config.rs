//! Configuration for one control-loop session.

use serde::{Deserialize, Serialize};

/// Budgets and switches for the plan/execute/reflect driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Total decision-service calls allowed for one session, verification
    /// sub-calls included. The loop aborts rather than exceed it.
    pub max_decision_calls: u32,

    /// Consecutive corrective retries allowed when a response carries no
    /// parseable action where one was expected.
    pub max_parse_retries: u32,

    /// Run a verification sub-call before accepting a declared completion.
    pub verify_completion: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_decision_calls: 40,
            max_parse_retries: 2,
            verify_completion: true,
        }
    }
}

impl LoopConfig {
    /// Tight budgets for tests.
    pub fn minimal() -> Self {
        Self {
            max_decision_calls: 10,
            max_parse_retries: 1,
            verify_completion: true,
        }
    }

    /// Builder: set the decision-call budget.
    pub fn decision_calls(mut self, calls: u32) -> Self {
        self.max_decision_calls = calls;
        self
    }

    /// Builder: toggle completion verification.
    pub fn verification(mut self, enabled: bool) -> Self {
        self.verify_completion = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = LoopConfig::default().decision_calls(5).verification(false);
        assert_eq!(config.max_decision_calls, 5);
        assert!(!config.verify_completion);
    }
}
