//! Control loop: an explicit plan/execute/reflect state machine driving one
//! agent session.
//!
//! The loop owns the transcript outright. Every decision request goes through
//! the same budgeted path; the only outcomes that escape are a completion or
//! an abort.

use std::sync::Arc;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use dom_perceiver::{compare, render_page, ChangeMagnitude, DomCapturePort, RenderedPage};
use stability_gate::{StabilityGate, StabilitySignals};
use webpilot_core_types::Action;

use crate::config::LoopConfig;
use crate::decision::{
    parse_action, ActionExecutor, CompletionSignal, Decision, DecisionOutcome, DecisionProvider,
};
use crate::errors::LoopError;
use crate::history::{Transcript, TranscriptEntry};

const PLAN_GUIDANCE: &str = "Plan: outline the steps needed to accomplish the instruction. \
List each step on its own line starting with '-'. Do not perform any actions in this step.";

const EXECUTE_GUIDANCE: &str = "Execute: carry out the plan step by step. Request at most one \
action per response, addressing elements by the ids shown in the page rendering. When the task \
is accomplished, signal completion with a result message instead of an action.";

const REFLECT_GUIDANCE: &str = "Reflect: review the trajectory so far and state whether the \
plan still fits. Answer REPLAN if the plan needs adjustment, otherwise CONTINUE. Do not \
perform any actions in this step.";

const VERIFY_GUIDANCE: &str = "Verify: check the declared result against the current page \
state. Answer VERIFIED if it holds, otherwise explain what is missing. Do not perform any \
actions in this step.";

const CORRECTIVE_NOTICE: &str = "The previous response could not be used: no structured \
decision was found where one was expected. Respond again following the requested format.";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Plan,
    Execute,
    Reflect,
}

/// Mutable loop state threaded through the iterative driver.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentState {
    pub phase: Phase,
    pub plan: Vec<String>,
    pub current_step: usize,
    pub retry_count: u32,
}

impl AgentState {
    fn new() -> Self {
        Self {
            phase: Phase::Plan,
            plan: Vec::new(),
            current_step: 0,
            retry_count: 0,
        }
    }
}

/// Final session outcome; nothing partial ever escapes the loop.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SessionOutcome {
    Completed { success: bool, message: String },
    Aborted { reason: String },
}

/// The session driver. Strictly sequential: one decision request, one action,
/// one snapshot at a time.
pub struct ControlLoop {
    config: LoopConfig,
    gate: StabilityGate,
    provider: Arc<dyn DecisionProvider>,
    executor: Arc<dyn ActionExecutor>,
    capture: Arc<dyn DomCapturePort>,
    signals: Arc<dyn StabilitySignals>,
}

impl ControlLoop {
    pub fn new(
        config: LoopConfig,
        gate: StabilityGate,
        provider: Arc<dyn DecisionProvider>,
        executor: Arc<dyn ActionExecutor>,
        capture: Arc<dyn DomCapturePort>,
        signals: Arc<dyn StabilitySignals>,
    ) -> Self {
        Self {
            config,
            gate,
            provider,
            executor,
            capture,
            signals,
        }
    }

    /// Run one session to its terminal outcome.
    pub async fn run(&self, instruction: &str) -> SessionOutcome {
        match self.drive(instruction).await {
            Ok(outcome) => outcome,
            Err(err) => SessionOutcome::Aborted {
                reason: err.to_string(),
            },
        }
    }

    async fn drive(&self, instruction: &str) -> Result<SessionOutcome, LoopError> {
        let mut transcript = Transcript::default();
        transcript.push(TranscriptEntry::instruction(instruction));

        if let Err(err) = self.gate.wait_until_stable(self.signals.as_ref()).await {
            warn!(%err, "stability wait failed; snapshotting anyway");
        }
        let mut current = self.observe().await?;
        transcript.push(TranscriptEntry::page_state(
            &current.snapshot.url,
            &current.text,
        ));

        let mut state = AgentState::new();
        let mut calls_used: u32 = 0;

        loop {
            match state.phase {
                Phase::Plan => {
                    let decision = self
                        .decide_in_phase(
                            &mut transcript,
                            &mut calls_used,
                            &mut state,
                            PLAN_GUIDANCE,
                            false,
                        )
                        .await?;
                    if decision.action.is_some() {
                        warn!("action requested during plan phase; discarded");
                    }
                    state.plan = extract_plan_steps(&decision.narrative);
                    state.current_step = 0;
                    debug!(steps = state.plan.len(), "plan recorded");
                    state.phase = Phase::Execute;
                }
                Phase::Execute => {
                    let decision = self
                        .decide_in_phase(
                            &mut transcript,
                            &mut calls_used,
                            &mut state,
                            EXECUTE_GUIDANCE,
                            true,
                        )
                        .await?;

                    if let Some(completion) = decision.completion.clone() {
                        let verified = if self.config.verify_completion {
                            self.verify(&mut transcript, &mut calls_used, &mut state, &completion)
                                .await?
                        } else {
                            true
                        };
                        if verified {
                            info!(success = completion.success, "session completed");
                            return Ok(SessionOutcome::Completed {
                                success: completion.success,
                                message: completion.message,
                            });
                        }
                        warn!("declared completion failed verification; replanning");
                        transcript.push(TranscriptEntry::observation(
                            "Completion verification failed: the declared result does not \
                             match the current page state.",
                        ));
                        state.phase = Phase::Plan;
                        continue;
                    }

                    match decision.action {
                        None => {
                            debug!("no action requested; moving to reflect");
                            state.phase = Phase::Reflect;
                        }
                        Some(request) => {
                            let action = match parse_action(&request) {
                                Ok(action) => action,
                                Err(err) => {
                                    return Ok(SessionOutcome::Aborted {
                                        reason: format!("malformed action request: {err}"),
                                    });
                                }
                            };
                            self.perform(&mut transcript, &action, &mut current).await?;
                            if state.current_step < state.plan.len() {
                                state.current_step += 1;
                            }
                        }
                    }
                }
                Phase::Reflect => {
                    let decision = self
                        .decide_in_phase(
                            &mut transcript,
                            &mut calls_used,
                            &mut state,
                            REFLECT_GUIDANCE,
                            false,
                        )
                        .await?;
                    if decision.action.is_some() {
                        warn!("action requested during reflect phase; discarded");
                    }
                    if wants_replan(&decision.narrative) {
                        debug!("reflection asked for a new plan");
                        state.phase = Phase::Plan;
                    } else {
                        state.phase = Phase::Execute;
                    }
                }
            }
        }
    }

    /// One budgeted decision request, with corrective retries for responses
    /// that cannot be parsed into a decision at all.
    async fn decide_in_phase(
        &self,
        transcript: &mut Transcript,
        calls_used: &mut u32,
        state: &mut AgentState,
        guidance: &str,
        actions_allowed: bool,
    ) -> Result<Decision, LoopError> {
        loop {
            if *calls_used >= self.config.max_decision_calls {
                return Err(LoopError::BudgetExhausted(self.config.max_decision_calls));
            }
            *calls_used += 1;

            transcript.compact();
            transcript.push(TranscriptEntry::guidance(guidance));

            match self
                .provider
                .decide(transcript.entries(), actions_allowed)
                .await?
            {
                DecisionOutcome::Decision(decision) => {
                    state.retry_count = 0;
                    if !decision.narrative.is_empty() {
                        transcript.push(TranscriptEntry::narrative(decision.narrative.clone()));
                    }
                    return Ok(decision);
                }
                DecisionOutcome::Unparseable { detail } => {
                    state.retry_count += 1;
                    warn!(
                        retry = state.retry_count,
                        %detail,
                        "unusable decision response; requesting correction"
                    );
                    if state.retry_count > self.config.max_parse_retries {
                        return Err(LoopError::decision(format!(
                            "unusable responses exceeded the retry limit: {detail}"
                        )));
                    }
                    transcript.push(TranscriptEntry::corrective(CORRECTIVE_NOTICE));
                }
            }
        }
    }

    async fn verify(
        &self,
        transcript: &mut Transcript,
        calls_used: &mut u32,
        state: &mut AgentState,
        completion: &CompletionSignal,
    ) -> Result<bool, LoopError> {
        transcript.push(TranscriptEntry::observation(format!(
            "Task completion declared ({}): {}",
            if completion.success { "success" } else { "failure" },
            completion.message
        )));
        let decision = self
            .decide_in_phase(transcript, calls_used, state, VERIFY_GUIDANCE, false)
            .await?;
        Ok(confirms(&decision))
    }

    /// Dispatch one action, wait for quiescence, re-perceive, and fold the
    /// classified change into the transcript.
    async fn perform(
        &self,
        transcript: &mut Transcript,
        action: &Action,
        current: &mut RenderedPage,
    ) -> Result<(), LoopError> {
        info!(%action, "dispatching action");
        if let Err(err) = self.executor.dispatch(action).await {
            warn!(%action, %err, "action dispatch failed");
            transcript.push(TranscriptEntry::observation(format!(
                "Action {action} could not be executed ({err}). No changes were applied \
                 to the page."
            )));
            return Ok(());
        }

        if let Err(err) = self.gate.wait_until_stable(self.signals.as_ref()).await {
            warn!(%err, "stability wait failed; snapshotting anyway");
        }

        let next = self.observe().await?;
        let report = compare(&current.text, &next.text);
        debug!(
            magnitude = ?report.magnitude,
            changed = report.changed_lines,
            "page change classified"
        );

        match report.magnitude {
            ChangeMagnitude::None => {
                transcript.push(TranscriptEntry::observation(format!(
                    "Action {action} executed. The page did not change. Current address: {}",
                    next.snapshot.url
                )));
            }
            ChangeMagnitude::Small => {
                transcript.push(TranscriptEntry::observation(format!(
                    "Action {action} executed. The page changed slightly ({} lines), likely \
                     a transient control such as a dropdown or popup. Current address: {}\n{}",
                    report.changed_lines,
                    next.snapshot.url,
                    report.diff_text.unwrap_or_default()
                )));
            }
            ChangeMagnitude::Large => {
                transcript.push(TranscriptEntry::page_state(&next.snapshot.url, &next.text));
            }
        }

        *current = next;
        Ok(())
    }

    async fn observe(&self) -> Result<RenderedPage, LoopError> {
        let raw = self.capture.capture().await?;
        let url = match self.capture.current_url().await {
            Ok(url) => url,
            Err(err) => {
                warn!(%err, "current address unavailable");
                "unknown".to_string()
            }
        };
        Ok(render_page(&raw, url))
    }
}

/// Pull plan steps out of a plan-phase narrative: one step per line, marked
/// with `-` or `N.`.
fn extract_plan_steps(narrative: &str) -> Vec<String> {
    static STEP: OnceLock<Regex> = OnceLock::new();
    let pattern = STEP.get_or_init(|| Regex::new(r"^\s*(?:-|\d+\.)\s*(.+)$").expect("static pattern"));
    narrative
        .lines()
        .filter_map(|line| pattern.captures(line).map(|captures| captures[1].trim().to_string()))
        .filter(|step| !step.is_empty())
        .collect()
}

fn wants_replan(narrative: &str) -> bool {
    narrative.to_lowercase().contains("replan")
}

fn confirms(decision: &Decision) -> bool {
    if let Some(completion) = &decision.completion {
        return completion.success;
    }
    let lowered = decision.narrative.to_lowercase();
    lowered.contains("verified")
        && !lowered.contains("not verified")
        && !lowered.contains("cannot verify")
        && !lowered.contains("unverified")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_steps_come_from_bullets_and_numbers() {
        let narrative = "Here is the plan:\n- open the login page\n2. enter the credentials\nsome prose\n- submit the form";
        let steps = extract_plan_steps(narrative);
        assert_eq!(
            steps,
            vec![
                "open the login page".to_string(),
                "enter the credentials".to_string(),
                "submit the form".to_string()
            ]
        );
    }

    #[test]
    fn replan_detection_is_case_insensitive() {
        assert!(wants_replan("REPLAN: the search box moved"));
        assert!(wants_replan("I think we should replan."));
        assert!(!wants_replan("CONTINUE with the current plan"));
    }

    #[test]
    fn verification_reads_signal_or_narrative() {
        let by_signal = Decision {
            narrative: String::new(),
            action: None,
            completion: Some(CompletionSignal {
                success: true,
                message: "done".to_string(),
            }),
        };
        assert!(confirms(&by_signal));

        let by_text = Decision {
            narrative: "VERIFIED: the order number is shown".to_string(),
            action: None,
            completion: None,
        };
        assert!(confirms(&by_text));

        let negative = Decision {
            narrative: "This is not verified, the cart is empty".to_string(),
            action: None,
            completion: None,
        };
        assert!(!confirms(&negative));
    }
}
