//! Session wiring: launch the bridge, build the loop, run one instruction.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use agent_loop::{ControlLoop, SessionOutcome};
use stability_gate::StabilityGate;
use webpilot_core_types::SessionId;

use crate::browser::ChromeBridge;
use crate::config::AppConfig;
use crate::llm::OpenAiDecisionProvider;

/// Run one instruction to its terminal outcome.
pub async fn run_session(config: AppConfig, instruction: String) -> Result<SessionOutcome> {
    let session = SessionId::new();
    info!(%session, model = %config.model, "starting session");

    let api_key = AppConfig::api_key()?;

    let headless = config.headless;
    let bridge = tokio::task::spawn_blocking(move || ChromeBridge::launch(headless))
        .await
        .context("browser launch task panicked")??;
    let bridge = Arc::new(bridge);

    bridge
        .open(&config.start_url)
        .await
        .with_context(|| format!("failed to open {}", config.start_url))?;

    let provider = Arc::new(OpenAiDecisionProvider::new(
        config.endpoint.clone(),
        config.model.clone(),
        api_key,
    ));

    let control = ControlLoop::new(
        config.loop_config.clone(),
        StabilityGate::new(config.gate.clone()),
        provider,
        bridge.clone(),
        bridge.clone(),
        bridge,
    );

    let outcome = control.run(&instruction).await;
    info!(%session, ?outcome, "session finished");
    Ok(outcome)
}
