//! Session control: the plan/execute/reflect driver, its transcript, and the
//! ports it speaks through.
//!
//! The loop is strictly sequential. It perceives through
//! [`dom_perceiver::DomCapturePort`], gates snapshots through
//! [`stability_gate::StabilityGate`], asks a [`DecisionProvider`] what to do,
//! and dispatches at most one [`webpilot_core_types::Action`] per cycle
//! through an [`ActionExecutor`].

pub mod config;
pub mod controller;
pub mod decision;
pub mod errors;
pub mod history;

pub use config::LoopConfig;
pub use controller::{AgentState, ControlLoop, Phase, SessionOutcome};
pub use decision::{
    extract_action_block, parse_action, ActionExecutor, ActionParseError, ActionRequest,
    CompletionSignal, Decision, DecisionOutcome, DecisionProvider,
};
pub use errors::LoopError;
pub use history::{EntryKind, EntryRole, Transcript, TranscriptEntry, REDACTED_NOTICE};
