//! Shared identifiers and the action vocabulary used across the webpilot crates.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Identifier for one agent session (one instruction, one control-loop run).
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier for one page element.
///
/// Valid for the same underlying element across repeated captures of one
/// browser state; a navigation invalidates all outstanding ids. Assigned by
/// the browser bridge, never by the perceiver.
#[derive(
    Clone, Copy, Debug, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One browser-facing action the decision service may request.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    /// Click the element with the given stable id.
    Click { node: NodeId },
    /// Replace the value of an input-like element, then fire input/change.
    TypeText { node: NodeId, text: String },
    /// Pick an option of a select element by option value.
    SelectOption { node: NodeId, value: String },
    /// Load a new address in the tab.
    Navigate { url: String },
}

impl Action {
    /// Element the action targets, if it targets one at all.
    pub fn target(&self) -> Option<NodeId> {
        match self {
            Action::Click { node } => Some(*node),
            Action::TypeText { node, .. } => Some(*node),
            Action::SelectOption { node, .. } => Some(*node),
            Action::Navigate { .. } => None,
        }
    }

    /// Short name matching the decision-service function vocabulary.
    pub fn name(&self) -> &'static str {
        match self {
            Action::Click { .. } => "click_element",
            Action::TypeText { .. } => "enter_text",
            Action::SelectOption { .. } => "select_option",
            Action::Navigate { .. } => "goto_url",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Click { node } => write!(f, "click_element({node})"),
            Action::TypeText { node, text } => write!(f, "enter_text({node}, {text:?})"),
            Action::SelectOption { node, value } => {
                write!(f, "select_option({node}, {value:?})")
            }
            Action::Navigate { url } => write!(f, "goto_url({url})"),
        }
    }
}

/// Failure reported by the action executor.
///
/// Dispatch failures are not fatal to a session; the control loop folds them
/// back into history so the decision service can re-plan around them.
#[derive(Clone, Debug, Error)]
pub enum ExecutorError {
    #[error("unknown element id {0}")]
    UnknownNode(NodeId),
    #[error("dispatch failed: {0}")]
    Dispatch(String),
}
