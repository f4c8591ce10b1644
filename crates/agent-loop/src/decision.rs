//! Decision-service contract: request/response types, the provider port, and
//! the parsing of action requests into typed actions.

use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use webpilot_core_types::{Action, ExecutorError, NodeId};

use crate::errors::LoopError;
use crate::history::TranscriptEntry;

/// A structured action request as the decision service emits it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    #[serde(alias = "action")]
    pub name: String,
    #[serde(default, alias = "parameters")]
    pub args: Value,
}

/// Declared task completion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CompletionSignal {
    pub success: bool,
    pub message: String,
}

/// One well-formed decision-service response.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Decision {
    /// Free-form reasoning text.
    pub narrative: String,
    /// At most one action per decision.
    pub action: Option<ActionRequest>,
    pub completion: Option<CompletionSignal>,
}

/// What came back from one decision request.
#[derive(Clone, Debug)]
pub enum DecisionOutcome {
    Decision(Decision),
    /// The response could not be parsed into a decision at all. The loop
    /// injects a corrective instruction and retries in the same phase.
    Unparseable { detail: String },
}

/// The external reasoning oracle. One synchronous request per call.
#[async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(
        &self,
        transcript: &[TranscriptEntry],
        actions_allowed: bool,
    ) -> Result<DecisionOutcome, LoopError>;
}

/// Executor of browser-facing actions; implemented by the browser bridge.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn dispatch(&self, action: &Action) -> Result<(), ExecutorError>;
}

#[derive(Debug, Error)]
pub enum ActionParseError {
    #[error("unknown action '{0}'")]
    UnknownAction(String),
    #[error("invalid arguments for '{name}': {detail}")]
    InvalidArguments { name: String, detail: String },
}

#[derive(Deserialize)]
struct NodeArgs {
    #[serde(alias = "nodeId", alias = "backendNodeId")]
    node: u64,
}

#[derive(Deserialize)]
struct TypeArgs {
    #[serde(alias = "nodeId", alias = "backendNodeId")]
    node: u64,
    text: String,
}

#[derive(Deserialize)]
struct SelectArgs {
    #[serde(alias = "nodeId", alias = "backendNodeId")]
    node: u64,
    value: String,
}

#[derive(Deserialize)]
struct NavigateArgs {
    url: String,
}

/// Turn a structured request into a typed action.
///
/// Failure here means the service asked for something with arguments the loop
/// cannot make sense of; there is no safe default, so the session aborts.
pub fn parse_action(request: &ActionRequest) -> Result<Action, ActionParseError> {
    fn args<T: serde::de::DeserializeOwned>(
        request: &ActionRequest,
    ) -> Result<T, ActionParseError> {
        serde_json::from_value(request.args.clone()).map_err(|err| {
            ActionParseError::InvalidArguments {
                name: request.name.clone(),
                detail: err.to_string(),
            }
        })
    }

    match request.name.as_str() {
        "click_element" => {
            let parsed: NodeArgs = args(request)?;
            Ok(Action::Click {
                node: NodeId(parsed.node),
            })
        }
        "enter_text" => {
            let parsed: TypeArgs = args(request)?;
            Ok(Action::TypeText {
                node: NodeId(parsed.node),
                text: parsed.text,
            })
        }
        "select_option" => {
            let parsed: SelectArgs = args(request)?;
            Ok(Action::SelectOption {
                node: NodeId(parsed.node),
                value: parsed.value,
            })
        }
        "goto_url" => {
            let parsed: NavigateArgs = args(request)?;
            Ok(Action::Navigate { url: parsed.url })
        }
        other => Err(ActionParseError::UnknownAction(other.to_string())),
    }
}

/// Fallback parser: fish an action block out of free-form narrative text.
///
/// Used only when the service did not answer through its structured channel;
/// the structured path stays the primary contract.
pub fn extract_action_block(text: &str) -> Option<ActionRequest> {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    let fenced = FENCED.get_or_init(|| {
        Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("static pattern")
    });

    if let Some(captures) = fenced.captures(text) {
        if let Ok(request) = serde_json::from_str::<ActionRequest>(&captures[1]) {
            if !request.name.is_empty() {
                return Some(request);
            }
        }
    }

    // Last resort: the widest brace span in the text.
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let request = serde_json::from_str::<ActionRequest>(&text[start..=end]).ok()?;
    if request.name.is_empty() {
        None
    } else {
        Some(request)
    }
}
