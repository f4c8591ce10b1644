//! Application configuration assembled from CLI flags and the environment.

use agent_loop::LoopConfig;
use serde::{Deserialize, Serialize};
use stability_gate::GateConfig;

/// Environment variable holding the decision-service API key.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_START_URL: &str = "https://www.google.com";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat-completions endpoint of the decision service.
    pub endpoint: String,
    pub model: String,
    /// Address loaded before the session starts.
    pub start_url: String,
    pub headless: bool,
    pub gate: GateConfig,
    pub loop_config: LoopConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            start_url: DEFAULT_START_URL.to_string(),
            headless: true,
            gate: GateConfig::default(),
            loop_config: LoopConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read the decision-service API key from the environment.
    pub fn api_key() -> anyhow::Result<String> {
        std::env::var(API_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{API_KEY_ENV} is not set in the environment"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_a_chat_completions_endpoint() {
        let config = AppConfig::default();
        assert!(config.endpoint.ends_with("/chat/completions"));
        assert!(config.headless);
        assert_eq!(config.loop_config.max_decision_calls, 40);
    }
}
